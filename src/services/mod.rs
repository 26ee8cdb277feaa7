//! Services layer - Business logic
//!
//! This module contains the business logic of the Parkping service:
//! - Deadline computation and reminder checkpoint planning (pure functions)
//! - The per-session reminder scheduler and the startup recovery sweep
//! - Session lifecycle operations
//! - The outbound notification channel

pub mod deadline;
pub mod intervals;
pub mod reminder;
pub mod session;
pub mod telegram;

pub use deadline::{compute_end_time, DeadlineError, StayLimit, DEFAULT_MAX_STAY_MINUTES};
pub use intervals::plan_checkpoints;
pub use reminder::ReminderScheduler;
pub use session::{CreateSessionInput, SessionService, SessionServiceError};
pub use telegram::{DisabledNotifier, Notifier, TelegramNotifier};
