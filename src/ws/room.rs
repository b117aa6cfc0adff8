// src/ws/room.rs
use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;

pub type SessionSender = mpsc::UnboundedSender<ServerEvent>;

/// Room every socket joins on connect; carries `newChat`/`closeCase` for the
/// case-list views, which have no per-case room to sit in.
pub const LOBBY: Uuid = Uuid::nil();

/// Maps a case id to the sessions currently watching it. Purely in-memory:
/// nothing here survives a restart, clients re-join and re-fetch on
/// reconnect. Membership is only ever mutated by the owning session's
/// join/leave (or its disconnect cleanup).
#[derive(Debug, Default)]
pub struct RoomRouter {
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, SessionSender>>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        RoomRouter::default()
    }

    /// Idempotent: re-joining replaces the session's sender handle.
    pub async fn join(&self, case_id: Uuid, session_id: Uuid, sender: SessionSender) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(case_id).or_default().insert(session_id, sender);
    }

    /// Idempotent: leaving a room the session never joined is a no-op.
    pub async fn leave(&self, case_id: Uuid, session_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&case_id) {
            room.remove(&session_id);
            if room.is_empty() {
                rooms.remove(&case_id);
            }
        }
    }

    /// Disconnect cleanup: drops the session from every room it sits in.
    pub async fn leave_all(&self, session_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, room| {
            room.remove(&session_id);
            !room.is_empty()
        });
    }

    /// Best-effort, at-most-once delivery to current members, optionally
    /// skipping the sender. Sessions whose channel has gone away are pruned
    /// on the spot; nobody is retried.
    pub async fn broadcast(&self, case_id: Uuid, event: ServerEvent, exclude: Option<Uuid>) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&case_id) else {
            return;
        };

        room.retain(|session_id, sender| {
            if Some(*session_id) == exclude {
                return !sender.is_closed();
            }
            sender.send(event.clone()).is_ok()
        });

        if room.is_empty() {
            rooms.remove(&case_id);
        }
    }

    pub async fn is_member(&self, case_id: Uuid, session_id: Uuid) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(&case_id)
            .map(|room| room.contains_key(&session_id))
            .unwrap_or(false)
    }

    pub async fn member_count(&self, case_id: Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&case_id).map(|room| room.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(case_id: Uuid) -> ServerEvent {
        ServerEvent::Typing {
            case_id,
            user: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        router.join(case_id, session_id, tx.clone()).await;
        router.join(case_id, session_id, tx).await;

        assert_eq!(router.member_count(case_id).await, 1);
    }

    #[tokio::test]
    async fn test_leave_of_non_member_is_noop() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();

        router.leave(case_id, Uuid::new_v4()).await;
        assert_eq!(router.member_count(case_id).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_members() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        router.join(case_id, Uuid::new_v4(), tx_a).await;
        router.join(case_id, Uuid::new_v4(), tx_b).await;

        router.broadcast(case_id, typing(case_id), None).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let router = RoomRouter::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        router.join(room_a, Uuid::new_v4(), tx_a).await;
        router.join(room_b, Uuid::new_v4(), tx_b).await;

        router.broadcast(room_b, typing(room_b), None).await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_can_exclude_sender() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let sender_session = Uuid::new_v4();
        let (tx_sender, mut rx_sender) = mpsc::unbounded_channel();
        let (tx_other, mut rx_other) = mpsc::unbounded_channel();

        router.join(case_id, sender_session, tx_sender).await;
        router.join(case_id, Uuid::new_v4(), tx_other).await;

        router
            .broadcast(case_id, typing(case_id), Some(sender_session))
            .await;

        assert!(rx_sender.try_recv().is_err());
        assert!(rx_other.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_two_sessions_of_same_viewer_both_receive() {
        // two browser tabs for the same agent are two sessions; closing one
        // must not affect delivery to the other
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let tab_one = Uuid::new_v4();
        let tab_two = Uuid::new_v4();
        let (tx_one, mut rx_one) = mpsc::unbounded_channel();
        let (tx_two, mut rx_two) = mpsc::unbounded_channel();

        router.join(case_id, tab_one, tx_one).await;
        router.join(case_id, tab_two, tx_two).await;

        router.broadcast(case_id, typing(case_id), None).await;
        assert!(rx_one.try_recv().is_ok());
        assert!(rx_two.try_recv().is_ok());

        router.leave(case_id, tab_one).await;
        router.broadcast(case_id, typing(case_id), None).await;
        assert!(rx_two.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dead_sessions_are_pruned_on_broadcast() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();

        router.join(case_id, Uuid::new_v4(), tx_dead).await;
        router.join(case_id, Uuid::new_v4(), tx_live).await;
        drop(rx_dead);

        router.broadcast(case_id, typing(case_id), None).await;

        assert_eq!(router.member_count(case_id).await, 1);
        assert!(rx_live.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_leave_all_empties_every_room() {
        let router = RoomRouter::new();
        let session_id = Uuid::new_v4();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        router.join(LOBBY, session_id, tx.clone()).await;
        router.join(room_a, session_id, tx.clone()).await;
        router.join(room_b, session_id, tx).await;

        router.leave_all(session_id).await;

        assert_eq!(router.member_count(LOBBY).await, 0);
        assert_eq!(router.member_count(room_a).await, 0);
        assert_eq!(router.member_count(room_b).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room_is_noop() {
        let router = RoomRouter::new();
        let case_id = Uuid::new_v4();

        router
            .broadcast(
                case_id,
                ServerEvent::MessageDeleted {
                    case_id,
                    message_id: Uuid::new_v4(),
                },
                None,
            )
            .await;

        assert_eq!(router.member_count(case_id).await, 0);
    }
}
