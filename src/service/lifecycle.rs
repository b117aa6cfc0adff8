// src/service/lifecycle.rs
//
// One lifecycle engine for all three actor classes. Handlers never branch on
// role themselves; they ask these predicates.
use uuid::Uuid;

use super::error::SupportError;
use crate::models::casemodel::{ActorRole, CaseStatus, SupportCase};

/// Outcome of a legal status-change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The store should apply the transition.
    Apply,
    /// Already in the target state for the same actor class; nothing to do.
    NoOp,
}

/// The transition table: open -> closed, closing is terminal. Re-closing by
/// the actor class that closed is the idempotent no-op; everything else is
/// an invalid transition.
pub fn check_transition(
    case: &SupportCase,
    new_status: CaseStatus,
    actor: ActorRole,
) -> Result<TransitionOutcome, SupportError> {
    match (case.status, new_status) {
        (CaseStatus::Open, CaseStatus::Closed) => Ok(TransitionOutcome::Apply),
        (CaseStatus::Closed, CaseStatus::Closed) if case.closed_by == Some(actor) => {
            Ok(TransitionOutcome::NoOp)
        }
        (from, to) => Err(SupportError::InvalidTransition { from, to }),
    }
}

/// Whether the actor is a party to the case.
///
/// Clients are scoped to cases they opened; for anonymous cases both sides
/// of the comparison are `None`, so possession of the case id is the
/// capability. Agents are a party as the assigned agent of a B2C case or as
/// the opener of their own case. Admins cover the whole pool.
pub fn can_view(case: &SupportCase, role: ActorRole, actor_id: Option<Uuid>) -> bool {
    match role {
        ActorRole::Admin => true,
        ActorRole::Agent => {
            actor_id.is_some()
                && (case.target_agent_id == actor_id || case.opened_by_user_id == actor_id)
        }
        ActorRole::Client => {
            case.opened_by == ActorRole::Client && case.opened_by_user_id == actor_id
        }
    }
}

/// Messaging rights coincide with being a party; the open/closed check is
/// the store's job, not a permission.
pub fn can_message(case: &SupportCase, role: ActorRole, actor_id: Option<Uuid>) -> bool {
    can_view(case, role, actor_id)
}

/// A B2C case may be closed by its client or the assigned agent/admin; a
/// B2B case by either party.
pub fn can_close(case: &SupportCase, role: ActorRole, actor_id: Option<Uuid>) -> bool {
    can_view(case, role, actor_id)
}

/// Ratings come from the client, with the close, and never afterwards.
pub fn can_rate(role: ActorRole) -> bool {
    role == ActorRole::Client
}

/// Message deletion is a moderation tool.
pub fn can_moderate(role: ActorRole) -> bool {
    role == ActorRole::Admin
}
