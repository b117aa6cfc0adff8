// src/handler/ws_handler.rs
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    ws::{
        events::{ClientEvent, ServerEvent},
        room::{RoomRouter, SessionSender, LOBBY},
    },
    AppState,
};

/// One long-lived socket per client session. Room membership is scoped to
/// this connection: every exit path funnels through the `leave_all` below,
/// so navigating away, erroring out, or dropping the tab all release the
/// same way.
pub async fn support_ws(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let rooms = app_state.rooms.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // every session sits in the lobby for newChat/closeCase list updates
    rooms.join(LOBBY, session_id, tx.clone()).await;

    tracing::debug!("support ws session {} connected", session_id);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                handle_client_event(&rooms, session_id, &tx, event).await;
                            }
                            Err(err) => {
                                // the event channel never carries error payloads;
                                // malformed frames are dropped
                                tracing::debug!(
                                    "dropping malformed frame from session {}: {}",
                                    session_id,
                                    err
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("ws error on session {}: {}", session_id, err);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(payload) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!("failed to encode server event: {}", err);
                    }
                }
            }
        }
    }

    rooms.leave_all(session_id).await;
    tracing::debug!("support ws session {} disconnected", session_id);
}

async fn handle_client_event(
    rooms: &RoomRouter,
    session_id: Uuid,
    tx: &SessionSender,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom { case_id } => {
            rooms.join(case_id, session_id, tx.clone()).await;
            tracing::debug!(
                "session {} joined room {} ({} members)",
                session_id,
                case_id,
                rooms.member_count(case_id).await
            );
        }
        ClientEvent::LeaveRoom { case_id } => {
            rooms.leave(case_id, session_id).await;
        }
        // typing hints are ephemeral: relayed to the rest of the room,
        // never persisted
        ClientEvent::Typing { case_id, user } => {
            if rooms.is_member(case_id, session_id).await {
                rooms
                    .broadcast(case_id, ServerEvent::Typing { case_id, user }, Some(session_id))
                    .await;
            }
        }
        ClientEvent::StopTyping { case_id, user } => {
            if rooms.is_member(case_id, session_id).await {
                rooms
                    .broadcast(
                        case_id,
                        ServerEvent::StopTyping { case_id, user },
                        Some(session_id),
                    )
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typing_is_relayed_to_other_members_only() {
        let rooms = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let typist = Uuid::new_v4();
        let watcher = Uuid::new_v4();
        let (tx_typist, mut rx_typist) = mpsc::unbounded_channel();
        let (tx_watcher, mut rx_watcher) = mpsc::unbounded_channel();

        rooms.join(case_id, typist, tx_typist.clone()).await;
        rooms.join(case_id, watcher, tx_watcher).await;

        handle_client_event(
            &rooms,
            typist,
            &tx_typist,
            ClientEvent::Typing {
                case_id,
                user: "Ada".to_string(),
            },
        )
        .await;

        assert!(rx_typist.try_recv().is_err());
        assert!(matches!(
            rx_watcher.try_recv(),
            Ok(ServerEvent::Typing { .. })
        ));
    }

    #[tokio::test]
    async fn test_typing_outside_a_joined_room_is_dropped() {
        let rooms = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let member = Uuid::new_v4();
        let (tx_outsider, _rx_outsider) = mpsc::unbounded_channel();
        let (tx_member, mut rx_member) = mpsc::unbounded_channel();

        rooms.join(case_id, member, tx_member).await;

        handle_client_event(
            &rooms,
            outsider,
            &tx_outsider,
            ClientEvent::Typing {
                case_id,
                user: "Eve".to_string(),
            },
        )
        .await;

        assert!(rx_member.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_then_leave_round_trip() {
        let rooms = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        handle_client_event(
            &rooms,
            session_id,
            &tx,
            ClientEvent::JoinRoom { case_id },
        )
        .await;
        assert!(rooms.is_member(case_id, session_id).await);

        handle_client_event(
            &rooms,
            session_id,
            &tx,
            ClientEvent::LeaveRoom { case_id },
        )
        .await;
        assert!(!rooms.is_member(case_id, session_id).await);
    }
}
