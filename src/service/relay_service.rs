// src/service/relay_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{casedb::CaseExt, db::DBClient},
    models::casemodel::*,
    service::{
        error::SupportError,
        lifecycle::{self, TransitionOutcome},
    },
    utils::linkify,
    ws::{
        events::ServerEvent,
        room::{RoomRouter, LOBBY},
    },
};

/// Who is acting. Resolved from the JWT for authenticated callers, or from
/// inline contact fields for the pre-auth customer widget.
#[derive(Debug, Clone)]
pub struct AuthorIdentity {
    pub role: ActorRole,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl AuthorIdentity {
    fn has_contact(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
            || self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewCaseInput {
    pub inquiry_about: String,
    pub inquiry_details: Option<String>,
    pub message: Option<String>,
    pub property_id: Option<Uuid>,
    pub target_agent_id: Option<Uuid>,
}

/// The only path through which cases change. Persists through the Case
/// Store, then notifies the rooms; the broadcast is a latency hint, never
/// the system of record, and is not retried on failure.
#[derive(Debug)]
pub struct MessageRelay {
    db_client: Arc<DBClient>,
    rooms: Arc<RoomRouter>,
}

impl MessageRelay {
    pub fn new(db_client: Arc<DBClient>, rooms: Arc<RoomRouter>) -> Self {
        MessageRelay { db_client, rooms }
    }

    pub async fn open_case(
        &self,
        author: &AuthorIdentity,
        input: NewCaseInput,
    ) -> Result<SupportCaseWithMessages, SupportError> {
        if input.inquiry_about.trim().is_empty() {
            return Err(SupportError::Validation(
                "inquiry_about must not be empty".to_string(),
            ));
        }
        if author.name.trim().is_empty() {
            return Err(SupportError::Validation(
                "a display name is required to open a case".to_string(),
            ));
        }
        if author.user_id.is_none() && !author.has_contact() {
            return Err(SupportError::Validation(
                "an email or phone number is required to open a case".to_string(),
            ));
        }

        let first_text = input
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| input.inquiry_details.clone())
            .unwrap_or_else(|| input.inquiry_about.clone());

        let record = NewCaseRecord {
            category: author.role.opens_category(),
            opened_by: author.role,
            opened_by_user_id: author.user_id,
            target_agent_id: input.target_agent_id,
            property_id: input.property_id,
            display_name_one: author.name.clone(),
            display_name_two: "Platform Support".to_string(),
            inquiry_about: input.inquiry_about,
            inquiry_details: input.inquiry_details,
        };

        let first_message = NewMessageRecord {
            id: Uuid::new_v4(),
            author_role: author.role,
            customer_name: author.name.clone(),
            customer_email: author.email.clone(),
            user_id: author.user_id,
            body: linkify::render_body(&first_text),
        };

        let created = self.db_client.create_case(record, first_message).await?;

        // list views live in the lobby; the case's own room has no members yet
        self.rooms
            .broadcast(
                LOBBY,
                ServerEvent::NewChat {
                    case: created.case.clone(),
                },
                None,
            )
            .await;

        Ok(created)
    }

    /// Persist-then-publish. The sender's own role is implicitly seen; every
    /// session in the room, the sender's included, gets the broadcast so
    /// optimistic local state can reconcile against the stored row.
    pub async fn send(
        &self,
        case_id: Uuid,
        author: &AuthorIdentity,
        text: &str,
        client_message_id: Option<Uuid>,
    ) -> Result<CaseMessage, SupportError> {
        if text.trim().is_empty() {
            return Err(SupportError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        if author.name.trim().is_empty() {
            return Err(SupportError::Validation(
                "a display name is required to send a message".to_string(),
            ));
        }

        let case = self
            .db_client
            .get_case(case_id)
            .await?
            .ok_or(SupportError::CaseNotFound(case_id))?;

        if case.status == CaseStatus::Closed {
            return Err(SupportError::CaseClosed(case_id));
        }
        if !lifecycle::can_message(&case, author.role, author.user_id) {
            return Err(SupportError::Unauthorized(author.role));
        }

        let record = NewMessageRecord {
            id: client_message_id.unwrap_or_else(Uuid::new_v4),
            author_role: author.role,
            customer_name: author.name.clone(),
            customer_email: author.email.clone(),
            user_id: author.user_id,
            body: linkify::render_body(text),
        };

        // the guarded insert re-checks the status atomically; a close that
        // landed between the fetch above and here surfaces as a miss
        let message = self
            .db_client
            .append_message(case_id, record)
            .await?
            .ok_or(SupportError::CaseClosed(case_id))?;

        self.rooms
            .broadcast(
                case_id,
                ServerEvent::ReceiveMessage {
                    case_id,
                    message: message.clone(),
                },
                None,
            )
            .await;

        Ok(message)
    }

    pub async fn close(
        &self,
        case_id: Uuid,
        actor: &AuthorIdentity,
        rating: Option<i16>,
    ) -> Result<SupportCase, SupportError> {
        if rating.is_some() && !lifecycle::can_rate(actor.role) {
            return Err(SupportError::Unauthorized(actor.role));
        }

        let case = self
            .db_client
            .get_case(case_id)
            .await?
            .ok_or(SupportError::CaseNotFound(case_id))?;

        if !lifecycle::can_close(&case, actor.role, actor.user_id) {
            return Err(SupportError::Unauthorized(actor.role));
        }

        match lifecycle::check_transition(&case, CaseStatus::Closed, actor.role)? {
            TransitionOutcome::NoOp => {
                // rating is close-time-only; a late rating on the idempotent
                // path is a closed-case mutation
                if rating.is_some() {
                    return Err(SupportError::CaseClosed(case_id));
                }
                Ok(case)
            }
            TransitionOutcome::Apply => {
                let closed = self.db_client.close_case(case_id, actor.role, rating).await?;

                let closed = match closed {
                    Some(closed) => closed,
                    // lost the race to another closer; re-read and re-judge
                    None => {
                        let fresh = self
                            .db_client
                            .get_case(case_id)
                            .await?
                            .ok_or(SupportError::CaseNotFound(case_id))?;
                        return match lifecycle::check_transition(
                            &fresh,
                            CaseStatus::Closed,
                            actor.role,
                        )? {
                            TransitionOutcome::NoOp if rating.is_none() => Ok(fresh),
                            _ => Err(SupportError::CaseClosed(case_id)),
                        };
                    }
                };

                let event = ServerEvent::CloseCase {
                    case: closed.clone(),
                    closed_by: actor.role,
                };
                self.rooms.broadcast(case_id, event.clone(), None).await;
                self.rooms.broadcast(LOBBY, event, None).await;

                Ok(closed)
            }
        }
    }

    pub async fn delete_message(
        &self,
        case_id: Uuid,
        message_id: Uuid,
        actor: &AuthorIdentity,
    ) -> Result<(), SupportError> {
        if !lifecycle::can_moderate(actor.role) {
            return Err(SupportError::Unauthorized(actor.role));
        }

        self.db_client
            .get_case(case_id)
            .await?
            .ok_or(SupportError::CaseNotFound(case_id))?;

        let deleted = self.db_client.delete_message(case_id, message_id).await?;
        if !deleted {
            return Err(SupportError::MessageNotFound(message_id));
        }

        self.rooms
            .broadcast(
                case_id,
                ServerEvent::MessageDeleted {
                    case_id,
                    message_id,
                },
                None,
            )
            .await;

        Ok(())
    }

    pub async fn mark_seen(
        &self,
        case_id: Uuid,
        actor: &AuthorIdentity,
        up_to_message_id: Option<Uuid>,
    ) -> Result<(), SupportError> {
        let case = self
            .db_client
            .get_case(case_id)
            .await?
            .ok_or(SupportError::CaseNotFound(case_id))?;

        if !lifecycle::can_view(&case, actor.role, actor.user_id) {
            return Err(SupportError::Unauthorized(actor.role));
        }

        self.db_client
            .mark_seen(case_id, actor.role, up_to_message_id)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    // a lazily-connected pool; paths under test either reject before touching
    // it or fail fast on acquire
    fn relay() -> MessageRelay {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://localhost:1/estatedesk")
            .unwrap();
        MessageRelay::new(Arc::new(DBClient::new(pool)), Arc::new(RoomRouter::new()))
    }

    fn anonymous(name: &str, email: Option<&str>) -> AuthorIdentity {
        AuthorIdentity {
            role: ActorRole::Client,
            user_id: None,
            name: name.to_string(),
            email: email.map(|e| e.to_string()),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_send_rejects_whitespace_only_text() {
        let relay = relay();
        let author = anonymous("Ada", Some("ada@example.com"));
        let result = relay.send(Uuid::new_v4(), &author, "   \n\t ", None).await;
        assert!(matches!(result, Err(SupportError::Validation(_))));
    }

    #[tokio::test]
    async fn test_open_case_requires_inquiry_about() {
        let relay = relay();
        let author = anonymous("Ada", Some("ada@example.com"));
        let result = relay
            .open_case(
                &author,
                NewCaseInput {
                    inquiry_about: "  ".to_string(),
                    inquiry_details: None,
                    message: None,
                    property_id: None,
                    target_agent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SupportError::Validation(_))));
    }

    #[tokio::test]
    async fn test_open_case_requires_contact_for_anonymous() {
        let relay = relay();
        let author = anonymous("Ada", None);
        let result = relay
            .open_case(
                &author,
                NewCaseInput {
                    inquiry_about: "Talk with Property Agent".to_string(),
                    inquiry_details: None,
                    message: None,
                    property_id: None,
                    target_agent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SupportError::Validation(_))));
    }

    #[tokio::test]
    async fn test_phone_satisfies_the_contact_rule() {
        // reaches the store and fails on the lazy pool instead of validation
        let relay = relay();
        let mut author = anonymous("Ada", None);
        author.phone = Some("+2348000000000".to_string());
        let result = relay
            .open_case(
                &author,
                NewCaseInput {
                    inquiry_about: "General Inquiry".to_string(),
                    inquiry_details: None,
                    message: None,
                    property_id: None,
                    target_agent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(SupportError::Database(_))));
    }

    #[tokio::test]
    async fn test_rating_is_client_only() {
        let relay = relay();
        let agent = AuthorIdentity {
            role: ActorRole::Agent,
            user_id: Some(Uuid::new_v4()),
            name: "Bea Agent".to_string(),
            email: None,
            phone: None,
        };
        let result = relay.close(Uuid::new_v4(), &agent, Some(4)).await;
        assert!(matches!(result, Err(SupportError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_delete_message_is_admin_only() {
        let relay = relay();
        let author = anonymous("Ada", Some("ada@example.com"));
        let result = relay
            .delete_message(Uuid::new_v4(), Uuid::new_v4(), &author)
            .await;
        assert!(matches!(result, Err(SupportError::Unauthorized(_))));
    }
}
