//! Parking session lifecycle
//!
//! Business logic for starting, listing and ending parking sessions.
//! Session creation is the production entry point into the reminder
//! subsystem: once the row is stored, the reminder task is spawned for
//! users with a linked chat. The other spawn point is the startup recovery
//! sweep; nothing else may spawn a task for a session.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::repositories::{
    CarRepository, ParkingLocationRepository, ParkingSessionRepository, SessionFilter,
};
use crate::models::{ParkingSession, ParkingSessionStatus, User};
use crate::services::deadline::{compute_end_time, DeadlineError, StayLimit};
use crate::services::reminder::ReminderScheduler;
use crate::services::telegram::Notifier;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// Car missing or owned by someone else
    #[error("Car not found in your garage")]
    CarNotFound,

    /// Referenced parking location does not exist
    #[error("Parking location not found")]
    LocationNotFound,

    /// Session missing or owned by someone else
    #[error("Parking session not found")]
    SessionNotFound,

    /// Session already completed or cancelled
    #[error("Parking session has already ended")]
    AlreadyEnded,

    /// No usable stay duration
    #[error(transparent)]
    InvalidDuration(#[from] DeadlineError),

    /// Storage failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Input for starting a parking session
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionInput {
    pub car_id: i64,
    pub parking_location_id: Option<i64>,
    pub manual_max_stay_minutes: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Parking session service
pub struct SessionService {
    sessions: Arc<dyn ParkingSessionRepository>,
    cars: Arc<dyn CarRepository>,
    locations: Arc<dyn ParkingLocationRepository>,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn Notifier>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn ParkingSessionRepository>,
        cars: Arc<dyn CarRepository>,
        locations: Arc<dyn ParkingLocationRepository>,
        scheduler: Arc<ReminderScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            cars,
            locations,
            scheduler,
            notifier,
        }
    }

    /// Start a parking session.
    ///
    /// The end time is fixed here, once: from the location's stay policy
    /// when a location is given, otherwise from the manual duration. When
    /// the user has a linked chat the reminder task is spawned and a
    /// best-effort "session started" notice is sent.
    pub async fn create_session(
        &self,
        user: &User,
        input: CreateSessionInput,
    ) -> Result<ParkingSession, SessionServiceError> {
        let car = self
            .cars
            .get_by_id(input.car_id)
            .await?
            .filter(|c| c.user_id == user.id)
            .ok_or(SessionServiceError::CarNotFound)?;

        let location = match input.parking_location_id {
            Some(id) => Some(
                self.locations
                    .get_by_id(id)
                    .await?
                    .ok_or(SessionServiceError::LocationNotFound)?,
            ),
            None => None,
        };

        let limit = match (&location, input.manual_max_stay_minutes) {
            (Some(location), _) => Some(StayLimit::Location {
                max_stay: location.max_stay,
            }),
            (None, Some(minutes)) => Some(StayLimit::Manual { minutes }),
            (None, None) => None,
        };

        let start_time = Utc::now();
        let end_time = compute_end_time(start_time, limit)?;

        let session = ParkingSession::new(
            user.id,
            car.id,
            location.as_ref().map(|l| l.id),
            input.latitude,
            input.longitude,
            start_time,
            end_time,
        );
        let session = self.sessions.create(&session).await?;

        if let Some(chat_id) = &user.telegram_chat_id {
            self.scheduler
                .spawn(chat_id.clone(), session.end_time, session.id.clone());

            let place = location
                .as_ref()
                .map(|l| format!(" at {}", l.location_name))
                .unwrap_or_default();
            let minutes = (session.end_time - session.start_time).num_minutes();
            let text = format!(
                "Your parking session{} for {} that lasts {} minutes has started.",
                place, car.license_plate, minutes
            );
            if let Err(error) = self.notifier.send(chat_id, &text).await {
                tracing::warn!(session_id = %session.id, %error, "start notification failed");
            }
        }

        Ok(session)
    }

    /// Mark a session as completed (the user left the spot)
    pub async fn complete_session(
        &self,
        user: &User,
        session_id: &str,
    ) -> Result<(), SessionServiceError> {
        self.end_session(user, session_id, ParkingSessionStatus::Completed)
            .await
    }

    /// Cancel a session (started by mistake)
    pub async fn cancel_session(
        &self,
        user: &User,
        session_id: &str,
    ) -> Result<(), SessionServiceError> {
        self.end_session(user, session_id, ParkingSessionStatus::Cancelled)
            .await
    }

    async fn end_session(
        &self,
        user: &User,
        session_id: &str,
        status: ParkingSessionStatus,
    ) -> Result<(), SessionServiceError> {
        let session = self
            .sessions
            .get_by_id(session_id)
            .await?
            .filter(|s| s.user_id == user.id)
            .ok_or(SessionServiceError::SessionNotFound)?;

        if !session.is_active() {
            return Err(SessionServiceError::AlreadyEnded);
        }

        // The guarded update loses against a concurrent expiry write
        if !self.sessions.update_status(session_id, status).await? {
            return Err(SessionServiceError::AlreadyEnded);
        }
        Ok(())
    }

    /// List the user's sessions, optionally filtered by status, car plate
    /// and start day. An unknown plate yields an empty list.
    pub async fn list_sessions(
        &self,
        user: &User,
        status: Option<ParkingSessionStatus>,
        car_reg: Option<&str>,
        day: Option<NaiveDate>,
    ) -> Result<Vec<ParkingSession>, SessionServiceError> {
        let car_id = match car_reg {
            Some(plate) => match self.cars.find_by_plate(user.id, plate).await? {
                Some(car) => Some(car.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let filter = SessionFilter {
            status,
            car_id,
            day,
        };
        Ok(self.sessions.list_by_user(user.id, &filter).await?)
    }
}
