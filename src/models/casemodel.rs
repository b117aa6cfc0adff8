// src/models/casemodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "case_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "case_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    B2c,
    B2b,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "actor_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Client,
    Agent,
    Admin,
}

impl ActorRole {
    pub fn to_str(&self) -> &str {
        match self {
            ActorRole::Client => "client",
            ActorRole::Agent => "agent",
            ActorRole::Admin => "admin",
        }
    }

    /// Maps the platform's user-role strings onto the three actor classes
    /// this service distinguishes. The platform issues more roles than the
    /// support channel cares about; anything staff-side above agent is admin.
    pub fn from_platform(role: &str) -> Option<ActorRole> {
        match role {
            "user" | "client" => Some(ActorRole::Client),
            "agent" | "landlord" => Some(ActorRole::Agent),
            "admin" | "super_admin" | "customer_care" => Some(ActorRole::Admin),
            _ => None,
        }
    }

    /// Category of a case opened by this role.
    pub fn opens_category(&self) -> CaseCategory {
        match self {
            ActorRole::Client => CaseCategory::B2c,
            ActorRole::Agent | ActorRole::Admin => CaseCategory::B2b,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportCase {
    pub id: Uuid,
    pub category: CaseCategory,
    pub opened_by: ActorRole,
    pub opened_by_user_id: Option<Uuid>,
    pub target_agent_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub display_name_one: String,
    pub display_name_two: String,
    pub inquiry_about: String,
    pub inquiry_details: Option<String>,
    pub status: CaseStatus,
    pub closed_by: Option<ActorRole>,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CaseMessage {
    pub id: Uuid,
    pub case_id: Uuid,
    /// Authoritative insertion order within the table; append order per case.
    pub seq: i64,
    pub author_role: ActorRole,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub user_id: Option<Uuid>,
    pub body: String,
    pub date: DateTime<Utc>,
    pub seen_by_client: bool,
    pub seen_by_agent: bool,
    pub seen_by_admin: bool,
}

impl CaseMessage {
    pub fn seen_by(&self, role: ActorRole) -> bool {
        match role {
            ActorRole::Client => self.seen_by_client,
            ActorRole::Agent => self.seen_by_agent,
            ActorRole::Admin => self.seen_by_admin,
        }
    }
}

/// Messages authored by other roles that `role` has not seen yet.
pub fn unseen_count(conversation: &[CaseMessage], role: ActorRole) -> i64 {
    conversation
        .iter()
        .filter(|m| m.author_role != role && !m.seen_by(role))
        .count() as i64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportCaseWithMessages {
    pub case: SupportCase,
    pub conversation: Vec<CaseMessage>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupportCaseWithUnseen {
    #[sqlx(flatten)]
    pub case: SupportCase,
    pub unseen_count: i64,
}

/// Fields of a case row not derivable at the storage layer.
#[derive(Debug, Clone)]
pub struct NewCaseRecord {
    pub category: CaseCategory,
    pub opened_by: ActorRole,
    pub opened_by_user_id: Option<Uuid>,
    pub target_agent_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub display_name_one: String,
    pub display_name_two: String,
    pub inquiry_about: String,
    pub inquiry_details: Option<String>,
}

/// A message ready for persistence. `id` may originate client-side so that
/// retried sends deduplicate on the primary key.
#[derive(Debug, Clone)]
pub struct NewMessageRecord {
    pub id: Uuid,
    pub author_role: ActorRole,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub user_id: Option<Uuid>,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author: ActorRole, seen_client: bool, seen_agent: bool, seen_admin: bool) -> CaseMessage {
        CaseMessage {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            seq: 1,
            author_role: author,
            customer_name: "Ada".to_string(),
            customer_email: Some("ada@example.com".to_string()),
            user_id: None,
            body: "hello".to_string(),
            date: Utc::now(),
            seen_by_client: seen_client,
            seen_by_agent: seen_agent,
            seen_by_admin: seen_admin,
        }
    }

    #[test]
    fn test_unseen_count_skips_own_messages() {
        let conversation = vec![
            message(ActorRole::Client, true, false, false),
            message(ActorRole::Client, true, false, false),
        ];
        assert_eq!(unseen_count(&conversation, ActorRole::Client), 0);
        assert_eq!(unseen_count(&conversation, ActorRole::Agent), 2);
        assert_eq!(unseen_count(&conversation, ActorRole::Admin), 2);
    }

    #[test]
    fn test_unseen_count_respects_seen_flags() {
        let conversation = vec![
            message(ActorRole::Agent, false, true, false),
            message(ActorRole::Agent, true, true, false),
            message(ActorRole::Client, true, false, false),
        ];
        assert_eq!(unseen_count(&conversation, ActorRole::Client), 1);
        assert_eq!(unseen_count(&conversation, ActorRole::Admin), 3);
        assert_eq!(unseen_count(&conversation, ActorRole::Agent), 1);
    }

    #[test]
    fn test_platform_role_mapping() {
        assert_eq!(ActorRole::from_platform("user"), Some(ActorRole::Client));
        assert_eq!(ActorRole::from_platform("agent"), Some(ActorRole::Agent));
        assert_eq!(ActorRole::from_platform("super_admin"), Some(ActorRole::Admin));
        assert_eq!(ActorRole::from_platform("vendor"), None);
    }

    #[test]
    fn test_opened_category() {
        assert_eq!(ActorRole::Client.opens_category(), CaseCategory::B2c);
        assert_eq!(ActorRole::Agent.opens_category(), CaseCategory::B2b);
        assert_eq!(ActorRole::Admin.opens_category(), CaseCategory::B2b);
    }
}
