//! Parking session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A timed parking session.
///
/// `end_time` is computed once at creation and never changes afterwards;
/// the reminder scheduler derives all trigger times from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSession {
    /// Session id (UUID)
    pub id: String,
    /// Owning user
    pub user_id: i64,
    /// Parked car
    pub car_id: i64,
    /// Registered location, when the session was started at one
    pub parking_location_id: Option<i64>,
    /// Where the car was left
    pub latitude: f64,
    pub longitude: f64,
    /// When parking started
    pub start_time: DateTime<Utc>,
    /// Deadline by which the car must leave
    pub end_time: DateTime<Utc>,
    /// Session status
    pub status: ParkingSessionStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ParkingSession {
    /// Create a new active session with a fresh id.
    pub fn new(
        user_id: i64,
        car_id: i64,
        parking_location_id: Option<i64>,
        latitude: f64,
        longitude: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            car_id,
            parking_location_id,
            latitude,
            longitude,
            start_time,
            end_time,
            status: ParkingSessionStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Check whether the session is still running
    pub fn is_active(&self) -> bool {
        self.status == ParkingSessionStatus::Active
    }
}

/// Status of a parking session.
///
/// `Cancelled` behaves like `Completed` for scheduling purposes: once a
/// session leaves `Active`, no further reminders are sent for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParkingSessionStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for ParkingSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParkingSessionStatus::Active => write!(f, "active"),
            ParkingSessionStatus::Completed => write!(f, "completed"),
            ParkingSessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ParkingSessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ParkingSessionStatus::Active),
            "completed" => Ok(ParkingSessionStatus::Completed),
            "cancelled" => Ok(ParkingSessionStatus::Cancelled),
            other => Err(format!("Invalid session status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_session_is_active() {
        let now = Utc::now();
        let session = ParkingSession::new(1, 2, None, 51.5, -0.12, now, now + Duration::minutes(60));

        assert!(session.is_active());
        assert_eq!(session.status, ParkingSessionStatus::Active);
        assert!(session.end_time > session.start_time);
        assert!(!session.id.is_empty());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ParkingSessionStatus::Active,
            ParkingSessionStatus::Completed,
            ParkingSessionStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<ParkingSessionStatus>().unwrap(), status);
        }
        assert!("expired".parse::<ParkingSessionStatus>().is_err());
    }
}
