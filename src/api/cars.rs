//! Car API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::User;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_car).get(list_cars))
        .route("/{id}", delete(delete_car))
}

#[derive(Debug, Deserialize)]
pub struct CreateCarRequest {
    pub license_plate: String,
}

/// Register a car in the caller's garage
pub async fn create_car(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateCarRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.license_plate.trim().is_empty() {
        return Err(ApiError::validation_error("License plate is required"));
    }

    let car = state
        .car_repo
        .create(user.id, &req.license_plate)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to create car");
            ApiError::internal_error("Failed to create car")
        })?;

    Ok((StatusCode::CREATED, Json(car)))
}

/// List the caller's cars
pub async fn list_cars(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let cars = state.car_repo.list_by_user(user.id).await.map_err(|error| {
        tracing::error!(%error, "failed to list cars");
        ApiError::internal_error("Failed to list cars")
    })?;

    Ok(Json(cars))
}

/// Remove a car from the caller's garage
pub async fn delete_car(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(car_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .car_repo
        .delete(car_id, user.id)
        .await
        .map_err(|error| {
            tracing::error!(%error, "failed to delete car");
            ApiError::internal_error("Failed to delete car")
        })?;

    if !deleted {
        return Err(ApiError::not_found("Car not found in your garage"));
    }

    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
