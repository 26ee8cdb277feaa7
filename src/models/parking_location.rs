//! Parking location model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A known parking spot with its stay policy.
///
/// `max_stay` feeds the deadline computation for sessions started at this
/// location; coordinates are only used to render human-readable text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingLocation {
    /// Unique identifier
    pub id: i64,
    /// User who registered the location
    pub owner_user_id: i64,
    /// Display name, e.g. "Tesco car park"
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Whether parking here is free or paid
    pub fee_classification: FeeClassification,
    /// Maximum stay in minutes, when the spot enforces one
    pub max_stay: Option<i64>,
    /// No-return window in minutes, when the spot enforces one
    pub no_return_time: Option<i64>,
    /// Visible to other users
    pub is_public: bool,
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ParkingLocation {
    /// Check whether `user_id` may see this location
    pub fn visible_to(&self, user_id: i64) -> bool {
        self.owner_user_id == user_id || (self.is_public && self.is_active)
    }
}

/// Fee classification of a parking location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeClassification {
    #[default]
    Free,
    Paid,
}

impl fmt::Display for FeeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeClassification::Free => write!(f, "free"),
            FeeClassification::Paid => write!(f, "paid"),
        }
    }
}

impl FromStr for FeeClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(FeeClassification::Free),
            "paid" => Ok(FeeClassification::Paid),
            other => Err(format!("Invalid fee classification: {}", other)),
        }
    }
}

/// Input for registering a new parking location
#[derive(Debug, Clone, Deserialize)]
pub struct CreateParkingLocationInput {
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub fee_classification: FeeClassification,
    pub max_stay: Option<i64>,
    pub no_return_time: Option<i64>,
    #[serde(default)]
    pub is_public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_classification_roundtrip() {
        assert_eq!("free".parse::<FeeClassification>().unwrap(), FeeClassification::Free);
        assert_eq!("paid".parse::<FeeClassification>().unwrap(), FeeClassification::Paid);
        assert!("metered".parse::<FeeClassification>().is_err());
        assert_eq!(FeeClassification::Paid.to_string(), "paid");
    }

    #[test]
    fn test_visibility() {
        let location = ParkingLocation {
            id: 1,
            owner_user_id: 7,
            location_name: "Side street".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            fee_classification: FeeClassification::Free,
            max_stay: None,
            no_return_time: None,
            is_public: false,
            is_active: true,
            created_at: Utc::now(),
        };

        assert!(location.visible_to(7));
        assert!(!location.visible_to(8));
    }
}
