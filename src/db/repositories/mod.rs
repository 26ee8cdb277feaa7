//! Repository layer
//!
//! Trait-based data access for the Parkping entities. Each repository has a
//! SQLx implementation that dispatches on the configured database driver.

mod car;
mod parking_location;
mod parking_session;
mod user;

pub use car::{CarRepository, SqlxCarRepository};
pub use parking_location::{ParkingLocationRepository, SqlxParkingLocationRepository};
pub use parking_session::{ParkingSessionRepository, SessionFilter, SqlxParkingSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
