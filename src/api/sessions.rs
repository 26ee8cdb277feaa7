//! Parking session API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ParkingSession, ParkingSessionStatus, User};
use crate::services::{CreateSessionInput, SessionServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/{id}/complete", post(complete_session))
        .route("/{id}/cancel", post(cancel_session))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub car_id: i64,
    pub parking_location_id: Option<i64>,
    pub manual_max_stay_minutes: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<String>,
    pub car_reg: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub car_id: i64,
    pub parking_location_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub created_at: String,
}

impl From<ParkingSession> for SessionResponse {
    fn from(session: ParkingSession) -> Self {
        Self {
            id: session.id,
            car_id: session.car_id,
            parking_location_id: session.parking_location_id,
            latitude: session.latitude,
            longitude: session.longitude,
            start_time: session.start_time.to_rfc3339(),
            end_time: session.end_time.to_rfc3339(),
            status: session.status.to_string(),
            created_at: session.created_at.to_rfc3339(),
        }
    }
}

/// Start a parking session
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateSessionInput {
        car_id: req.car_id,
        parking_location_id: req.parking_location_id,
        manual_max_stay_minutes: req.manual_max_stay_minutes,
        latitude: req.latitude,
        longitude: req.longitude,
    };

    let session = state
        .session_service
        .create_session(&user, input)
        .await
        .map_err(map_session_error)?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// List the caller's sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<ParkingSessionStatus>()
                .map_err(ApiError::validation_error)?,
        ),
        None => None,
    };

    let sessions = state
        .session_service
        .list_sessions(&user, status, query.car_reg.as_deref(), query.date)
        .await
        .map_err(map_session_error)?;

    let sessions: Vec<SessionResponse> = sessions.into_iter().map(Into::into).collect();
    Ok(Json(sessions))
}

/// Mark a session completed (the user left the spot)
pub async fn complete_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .session_service
        .complete_session(&user, &session_id)
        .await
        .map_err(map_session_error)?;

    Ok(Json(serde_json::json!({ "status": "completed" })))
}

/// Cancel a session started by mistake
pub async fn cancel_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .session_service
        .cancel_session(&user, &session_id)
        .await
        .map_err(map_session_error)?;

    Ok(Json(serde_json::json!({ "status": "cancelled" })))
}

fn map_session_error(error: SessionServiceError) -> ApiError {
    match error {
        SessionServiceError::CarNotFound
        | SessionServiceError::LocationNotFound
        | SessionServiceError::SessionNotFound => ApiError::not_found(error.to_string()),
        SessionServiceError::AlreadyEnded => ApiError::conflict(error.to_string()),
        SessionServiceError::InvalidDuration(e) => ApiError::validation_error(e.to_string()),
        SessionServiceError::Internal(e) => {
            tracing::error!(error = %e, "session operation failed");
            ApiError::internal_error("Session operation failed")
        }
    }
}
