//! Car model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Car entity registered in a user's garage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// License plate, stored upper-cased
    pub license_plate: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
