// src/ws/events.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::casemodel::{ActorRole, CaseMessage, SupportCase};

/// Frames a connected session may send over the event channel. Everything
/// durable goes through the REST surface; these only steer room membership
/// and the ephemeral typing hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom { case_id: Uuid },
    LeaveRoom { case_id: Uuid },
    Typing { case_id: Uuid, user: String },
    StopTyping { case_id: Uuid, user: String },
}

/// Frames pushed to room members. Best-effort notification hints; the Case
/// Store stays the system of record and clients re-fetch on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage { case_id: Uuid, message: CaseMessage },
    Typing { case_id: Uuid, user: String },
    StopTyping { case_id: Uuid, user: String },
    CloseCase { case: SupportCase, closed_by: ActorRole },
    NewChat { case: SupportCase },
    MessageDeleted { case_id: Uuid, message_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::casemodel::{CaseCategory, CaseStatus};
    use chrono::Utc;

    fn sample_case() -> SupportCase {
        SupportCase {
            id: Uuid::new_v4(),
            category: CaseCategory::B2c,
            opened_by: ActorRole::Client,
            opened_by_user_id: None,
            target_agent_id: None,
            property_id: None,
            display_name_one: "Ada".to_string(),
            display_name_two: "Platform Support".to_string(),
            inquiry_about: "Talk with Property Agent".to_string(),
            inquiry_details: None,
            status: CaseStatus::Open,
            closed_by: None,
            rating: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_client_event_wire_names() {
        let case_id = Uuid::new_v4();
        let event: ClientEvent =
            serde_json::from_value(serde_json::json!({
                "event": "joinRoom",
                "data": { "case_id": case_id }
            }))
            .unwrap();
        assert_eq!(event, ClientEvent::JoinRoom { case_id });

        let typing = serde_json::to_value(ClientEvent::Typing {
            case_id,
            user: "Ada".to_string(),
        })
        .unwrap();
        assert_eq!(typing["event"], "typing");
        assert_eq!(typing["data"]["user"], "Ada");
    }

    #[test]
    fn test_server_event_wire_names() {
        let case = sample_case();
        let close = serde_json::to_value(ServerEvent::CloseCase {
            case: case.clone(),
            closed_by: ActorRole::Client,
        })
        .unwrap();
        assert_eq!(close["event"], "closeCase");
        assert_eq!(close["data"]["closed_by"], "client");

        let new_chat = serde_json::to_value(ServerEvent::NewChat { case: case.clone() }).unwrap();
        assert_eq!(new_chat["event"], "newChat");
        assert_eq!(new_chat["data"]["case"]["status"], "open");

        let deleted = serde_json::to_value(ServerEvent::MessageDeleted {
            case_id: case.id,
            message_id: Uuid::new_v4(),
        })
        .unwrap();
        assert_eq!(deleted["event"], "messageDeleted");

        let stop = serde_json::to_value(ServerEvent::StopTyping {
            case_id: case.id,
            user: "Ada".to_string(),
        })
        .unwrap();
        assert_eq!(stop["event"], "stopTyping");
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>("{\"event\":\"sendRocket\"}").is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }
}
