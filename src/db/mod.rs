//! Database layer
//!
//! This module provides database abstraction for the Parkping service.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration. Repositories are
//! trait-based so services depend on `Arc<dyn ...Repository>` and can be
//! exercised against an in-memory SQLite pool in tests.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
