//! API middleware
//!
//! Contains the shared application state, the JSON error envelope, and the
//! identity middleware. Authentication itself happens upstream: the gateway
//! in front of this service validates credentials and injects the caller's
//! id as the `X-User-Id` header, which `require_user` resolves to a `User`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::repositories::{CarRepository, ParkingLocationRepository, UserRepository};
use crate::services::{Notifier, SessionService};

/// Header carrying the authenticated caller's id, set by the auth gateway
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<dyn UserRepository>,
    pub car_repo: Arc<dyn CarRepository>,
    pub location_repo: Arc<dyn ParkingLocationRepository>,
    pub session_service: Arc<SessionService>,
    pub notifier: Arc<dyn Notifier>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Resolve the caller to a `User` and stash it in request extensions.
///
/// Routes behind this middleware can extract `Extension<User>`.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());

    let Some(user_id) = user_id else {
        return ApiError::unauthorized("Missing or invalid X-User-Id header").into_response();
    };

    match state.user_repo.get_by_id(user_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => ApiError::unauthorized("Unknown user").into_response(),
        Err(error) => {
            tracing::error!(user_id, %error, "user lookup failed");
            ApiError::internal_error("User lookup failed").into_response()
        }
    }
}
