// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        support_handler::{support_auth_handler, support_handler},
        ws_handler::support_ws,
    },
    middleware::{auth, optional_auth},
    AppState,
};

// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // the customer-facing surface accepts anonymous callers; a valid token
    // attaches identity, handlers enforce what needs it
    let public_support_routes = support_handler()
        .route("/ws", get(support_ws))
        .layer(middleware::from_fn(optional_auth));

    let protected_support_routes = support_auth_handler().layer(middleware::from_fn(auth));

    let support_routes = Router::new()
        .merge(public_support_routes)
        .merge(protected_support_routes);

    let api_route = Router::new()
        .nest("/support", support_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
