//! User model
//!
//! Credentials and authentication live in the upstream gateway; this entity
//! only carries the notification linkage for a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing an account known to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Linked Telegram chat id; reminders are only scheduled when set
    pub telegram_chat_id: Option<String>,
    /// One-time `CONNECT_…` code pending redemption, burned on use
    #[serde(skip_serializing)]
    pub connection_code: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check whether the user can receive reminders
    pub fn has_notification_target(&self) -> bool {
        self.telegram_chat_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_target() {
        let mut user = User {
            id: 1,
            email: "driver@example.com".to_string(),
            telegram_chat_id: None,
            connection_code: None,
            created_at: Utc::now(),
        };
        assert!(!user.has_notification_target());

        user.telegram_chat_id = Some("555001".to_string());
        assert!(user.has_notification_target());
    }
}
