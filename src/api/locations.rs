//! Parking location API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateParkingLocationInput, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_location).get(list_locations))
        .route("/{id}", get(get_location))
}

/// Register a parking location
pub async fn create_location(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<CreateParkingLocationInput>,
) -> Result<impl IntoResponse, ApiError> {
    if input.location_name.trim().is_empty() {
        return Err(ApiError::validation_error("Location name is required"));
    }
    if input.max_stay.is_some_and(|minutes| minutes <= 0) {
        return Err(ApiError::validation_error("Max stay must be positive"));
    }

    let location = state
        .location_repo
        .create(user.id, &input)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to create parking location");
            ApiError::internal_error("Failed to create parking location")
        })?;

    Ok((StatusCode::CREATED, Json(location)))
}

/// List locations visible to the caller (their own plus public ones)
pub async fn list_locations(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let locations = state
        .location_repo
        .list_visible_to(user.id)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to list parking locations");
            ApiError::internal_error("Failed to list parking locations")
        })?;

    Ok(Json(locations))
}

/// Get a single location the caller may see
pub async fn get_location(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(location_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let location = state
        .location_repo
        .get_by_id(location_id)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to get parking location");
            ApiError::internal_error("Failed to get parking location")
        })?
        .filter(|location| location.visible_to(user.id))
        .ok_or_else(|| ApiError::not_found("Parking location not found"))?;

    Ok(Json(location))
}
