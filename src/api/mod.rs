//! API layer - HTTP handlers and routing
//!
//! The HTTP surface of the Parkping service:
//! - Parking session endpoints (create, list, complete, cancel)
//! - Car endpoints (register, list, delete)
//! - Parking location endpoints (register, list, get)
//! - Telegram linking (connect-code issuance and the bot webhook)
//! - Health check
//!
//! All `/api/v1` routes sit behind the `require_user` identity middleware;
//! the webhook and health endpoints are public.

pub mod cars;
pub mod locations;
pub mod middleware;
pub mod sessions;
pub mod webhook;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, USER_ID_HEADER};

/// Build the authenticated API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/sessions", sessions::router())
        .nest("/cars", cars::router())
        .nest("/locations", locations::router())
        .route(
            "/me/telegram/connect-code",
            post(webhook::issue_connect_code),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_user,
        ))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/webhooks/telegram", post(webhook::telegram_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
