//! Deadline computation for parking sessions
//!
//! A session's end time is fixed once at creation, either from the parking
//! location's stay policy or from a caller-supplied duration. Pure and
//! deterministic given the start time.

use chrono::{DateTime, Duration, Utc};

/// Stay duration assumed for locations without a configured maximum (24h)
pub const DEFAULT_MAX_STAY_MINUTES: i64 = 1440;

/// Error type for deadline computation
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineError {
    /// Neither a parking location nor a manual duration was supplied
    #[error("A parking location or a manual stay duration is required")]
    MissingDuration,

    /// The stay duration would end the session at or before its start
    #[error("Stay duration must be positive, got {0} minutes")]
    NonPositiveDuration(i64),
}

/// Which stay limit applies to a new session.
///
/// When the caller supplies both a location and a manual duration, the
/// location's policy wins; the manual value only applies to free-floating
/// sessions.
#[derive(Debug, Clone, Copy)]
pub enum StayLimit {
    /// Park at a registered location; `max_stay` is its policy in minutes
    Location { max_stay: Option<i64> },
    /// Free-floating park with a user-chosen duration in minutes
    Manual { minutes: i64 },
}

/// Compute a session's end time from its stay limit.
pub fn compute_end_time(
    start_time: DateTime<Utc>,
    limit: Option<StayLimit>,
) -> Result<DateTime<Utc>, DeadlineError> {
    let minutes = match limit {
        Some(StayLimit::Location { max_stay }) => max_stay.unwrap_or(DEFAULT_MAX_STAY_MINUTES),
        Some(StayLimit::Manual { minutes }) => minutes,
        None => return Err(DeadlineError::MissingDuration),
    };

    if minutes <= 0 {
        return Err(DeadlineError::NonPositiveDuration(minutes));
    }

    Ok(start_time + Duration::minutes(minutes))
}
