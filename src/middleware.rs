// src/middleware.rs
use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::casemodel::ActorRole,
    utils::token,
    AppState,
};

/// Identity carried by the platform JWT. No user-table lookup happens here;
/// user management lives outside this service and the claims are trusted
/// once the signature verifies.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: ActorRole,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddeware {
    pub user: AuthUser,
}

fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| {
                    if auth_value.starts_with("Bearer ") {
                        Some(auth_value[7..].to_owned())
                    } else {
                        None
                    }
                })
        })
}

fn authenticate(token: &str, app_state: &AppState) -> Result<AuthUser, HttpError> {
    let claims = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let role = ActorRole::from_platform(&claims.role).ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::PermissionDenied.to_string())
    })?;

    Ok(AuthUser {
        id,
        name: claims.name,
        email: claims.email,
        role,
    })
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req).ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
    })?;

    let user = authenticate(&token, &app_state)?;

    req.extensions_mut().insert(JWTAuthMiddeware { user });

    Ok(next.run(req).await)
}

/// The customer widget runs pre-auth, so the support surface accepts
/// anonymous requests: a valid token attaches identity, an absent or invalid
/// one leaves the request anonymous instead of rejecting it.
pub async fn optional_auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    if let Some(token) = extract_token(&cookie_jar, &req) {
        match authenticate(&token, &app_state) {
            Ok(user) => {
                req.extensions_mut().insert(JWTAuthMiddeware { user });
            }
            Err(_) => {
                tracing::debug!("ignoring invalid token on public support route");
            }
        }
    }

    Ok(next.run(req).await)
}
