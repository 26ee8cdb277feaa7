//! Data models
//!
//! This module contains all data structures used throughout the Parkping
//! service. Models represent:
//! - Database entities (User, Car, ParkingLocation, ParkingSession)
//! - API request/response types
//! - Internal data transfer objects

mod car;
mod parking_location;
mod parking_session;
mod user;

pub use car::Car;
pub use parking_location::{CreateParkingLocationInput, FeeClassification, ParkingLocation};
pub use parking_session::{ParkingSession, ParkingSessionStatus};
pub use user::User;
