use thiserror::Error;
use uuid::Uuid;
use crate::{
    error::HttpError,
    models::casemodel::{ActorRole, CaseStatus},
};
use axum::http::StatusCode;

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Case {0} not found")]
    CaseNotFound(Uuid),

    #[error("Message {0} not found")]
    MessageNotFound(Uuid),

    #[error("Case {0} is closed")]
    CaseClosed(Uuid),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    #[error("Role {} is not authorized to perform this action on this case", .0.to_str())]
    Unauthorized(ActorRole),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SupportError> for HttpError {
    fn from(error: SupportError) -> Self {
        match error {
            SupportError::CaseNotFound(_)
            | SupportError::MessageNotFound(_) => HttpError::not_found(error.to_string()),

            SupportError::Validation(_) => HttpError::bad_request(error.to_string()),

            SupportError::CaseClosed(_)
            | SupportError::InvalidTransition { .. } => HttpError::conflict(error.to_string()),

            SupportError::Unauthorized(_) => HttpError::new(error.to_string(), StatusCode::FORBIDDEN),

            SupportError::Database(_) => HttpError::server_error(error.to_string()),
        }
    }
}

