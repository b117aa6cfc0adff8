// src/handler/support_handler.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::casedb::CaseExt,
    dtos::supportdtos::*,
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    models::casemodel::{unseen_count, ActorRole, CaseStatus},
    service::{
        lifecycle,
        relay_service::{AuthorIdentity, NewCaseInput},
    },
    AppState,
};

/// Routes the pre-auth customer widget must be able to reach. A token still
/// attaches identity when present; listing stays here because clients list
/// their own cases too, with the handler requiring identity itself.
pub fn support_handler() -> Router {
    Router::new()
        .route("/cases", get(list_cases).post(create_case))
        .route("/cases/:case_id", get(get_case))
        .route("/cases/:case_id/messages", post(send_message))
        .route("/cases/:case_id/close", put(close_case))
        .route("/cases/:case_id/seen", put(mark_case_seen))
}

/// Routes that require an authenticated caller; routed behind the
/// required-auth middleware. Moderation stays admin-only via the relay.
pub fn support_auth_handler() -> Router {
    Router::new()
        .route("/cases/:case_id/messages/:message_id", delete(delete_message))
        .route("/unseen-count", get(get_unseen_count))
}

/// Turns the optional auth extension plus inline contact fields into the
/// acting identity. Anonymous callers act as clients; the relay validates
/// that they brought a name and a contact.
fn resolve_author(
    auth: Option<&JWTAuthMiddeware>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
) -> AuthorIdentity {
    match auth {
        Some(auth) => AuthorIdentity {
            role: auth.user.role,
            user_id: Some(auth.user.id),
            name: auth.user.name.clone(),
            email: auth.user.email.clone(),
            phone: None,
        },
        None => AuthorIdentity {
            role: ActorRole::Client,
            user_id: None,
            name: customer_name.unwrap_or_default(),
            email: customer_email,
            phone: customer_phone,
        },
    }
}

fn require_auth(auth: Option<Extension<JWTAuthMiddeware>>) -> Result<JWTAuthMiddeware, HttpError> {
    auth.map(|Extension(auth)| auth).ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string())
    })
}

pub async fn create_case(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Json(body): Json<CreateCaseDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let author = resolve_author(
        auth.as_deref(),
        body.customer_name,
        body.customer_email,
        body.customer_phone,
    );

    let created = app_state
        .relay
        .open_case(
            &author,
            NewCaseInput {
                inquiry_about: body.inquiry_about,
                inquiry_details: body.inquiry_details,
                message: body.message,
                property_id: body.property_id,
                target_agent_id: body.target_agent_id,
            },
        )
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": created
    })))
}

pub async fn get_case(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Path(case_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let bundle = app_state
        .db_client
        .get_case_with_messages(case_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Case not found"))?;

    let (role, actor_id) = match auth.as_deref() {
        Some(auth) => (auth.user.role, Some(auth.user.id)),
        None => (ActorRole::Client, None),
    };

    if !lifecycle::can_view(&bundle.case, role, actor_id) {
        return Err(HttpError::new(
            ErrorMessage::PermissionDenied.to_string(),
            StatusCode::FORBIDDEN,
        ));
    }

    // the pre-auth widget has no unseen-count endpoint; its badge rides on
    // the case fetch it already polls
    let unseen = unseen_count(&bundle.conversation, role);

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "case": bundle.case,
            "conversation": bundle.conversation,
            "unseen_count": unseen
        }
    })))
}

pub async fn list_cases(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Query(params): Query<CaseQueryParams>,
) -> Result<impl IntoResponse, HttpError> {
    let auth = require_auth(auth)?;

    let status = params.status.unwrap_or(CaseStatus::Open);
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20) as i64;
    let offset = ((page - 1) * limit as u32) as i64;

    let cases = app_state
        .db_client
        .list_cases(auth.user.role, auth.user.id, status, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "cases": cases,
            "page": page,
            "limit": limit
        }
    })))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Path(case_id): Path<Uuid>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let author = resolve_author(auth.as_deref(), body.customer_name, body.customer_email, None);

    let message = app_state
        .relay
        .send(case_id, &author, &body.message, body.client_message_id)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": message
    })))
}

pub async fn close_case(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Path(case_id): Path<Uuid>,
    body: Option<Json<CloseCaseDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let rating = match body {
        Some(Json(body)) => {
            body.validate()
                .map_err(|e| HttpError::bad_request(e.to_string()))?;
            body.rating
        }
        None => None,
    };

    let actor = resolve_author(auth.as_deref(), None, None, None);

    let case = app_state
        .relay
        .close(case_id, &actor, rating)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": case
    })))
}

pub async fn mark_case_seen(
    Extension(app_state): Extension<Arc<AppState>>,
    auth: Option<Extension<JWTAuthMiddeware>>,
    Path(case_id): Path<Uuid>,
    body: Option<Json<MarkSeenDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let actor = resolve_author(auth.as_deref(), None, None, None);
    let up_to_message_id = body.and_then(|Json(body)| body.up_to_message_id);

    app_state
        .relay
        .mark_seen(case_id, &actor, up_to_message_id)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Messages marked as seen"
    })))
}

pub async fn delete_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path((case_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let actor = resolve_author(Some(&auth), None, None, None);

    app_state
        .relay
        .delete_message(case_id, message_id, &actor)
        .await
        .map_err(HttpError::from)?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Message deleted"
    })))
}

pub async fn get_unseen_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state
        .db_client
        .unseen_total(auth.user.role, auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "unseen_count": count
        }
    })))
}
