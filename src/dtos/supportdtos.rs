// src/dtos/supportdtos.rs
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::casemodel::CaseStatus;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseDto {
    #[validate(length(min = 1, max = 200))]
    pub inquiry_about: String,
    #[validate(length(max = 2000))]
    pub inquiry_details: Option<String>,
    /// Caller-supplied first message; falls back to the inquiry text.
    #[validate(length(max = 5000))]
    pub message: Option<String>,
    pub property_id: Option<Uuid>,
    pub target_agent_id: Option<Uuid>,
    // identity fields for pre-auth customers; ignored when a token is present
    #[validate(length(max = 120))]
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(max = 32))]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageDto {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    /// Client-generated id so a retried send deduplicates server-side.
    pub client_message_id: Option<Uuid>,
    #[validate(length(max = 120))]
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseCaseDto {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenDto {
    pub up_to_message_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CaseQueryParams {
    pub status: Option<CaseStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
