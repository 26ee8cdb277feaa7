//! Car repository
//!
//! Database operations for the cars in a user's garage. Plates are stored
//! upper-cased so listing filters can match case-insensitively.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Car;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Car repository trait
#[async_trait]
pub trait CarRepository: Send + Sync {
    /// Register a car for a user
    async fn create(&self, user_id: i64, license_plate: &str) -> Result<Car>;

    /// Get car by id
    async fn get_by_id(&self, id: i64) -> Result<Option<Car>>;

    /// List a user's cars
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Car>>;

    /// Find a user's car by plate
    async fn find_by_plate(&self, user_id: i64, license_plate: &str) -> Result<Option<Car>>;

    /// Delete a user's car; returns false when the car wasn't theirs
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based car repository implementation
pub struct SqlxCarRepository {
    pool: DynDatabasePool,
}

impl SqlxCarRepository {
    /// Create a new SQLx car repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CarRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CarRepository for SqlxCarRepository {
    async fn create(&self, user_id: i64, license_plate: &str) -> Result<Car> {
        let plate = license_plate.trim().to_uppercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_car_sqlite(self.pool.as_sqlite().unwrap(), user_id, &plate).await
            }
            DatabaseDriver::Mysql => {
                create_car_mysql(self.pool.as_mysql().unwrap(), user_id, &plate).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Car>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_car_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_car_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Car>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_cars_by_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_cars_by_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn find_by_plate(&self, user_id: i64, license_plate: &str) -> Result<Option<Car>> {
        let plate = license_plate.trim().to_uppercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_car_by_plate_sqlite(self.pool.as_sqlite().unwrap(), user_id, &plate).await
            }
            DatabaseDriver::Mysql => {
                find_car_by_plate_mysql(self.pool.as_mysql().unwrap(), user_id, &plate).await
            }
        }
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_car_sqlite(self.pool.as_sqlite().unwrap(), id, user_id).await
            }
            DatabaseDriver::Mysql => {
                delete_car_mysql(self.pool.as_mysql().unwrap(), id, user_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_car_sqlite(pool: &SqlitePool, user_id: i64, plate: &str) -> Result<Car> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO cars (user_id, license_plate, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(plate)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create car")?;

    Ok(Car {
        id: result.last_insert_rowid(),
        user_id,
        license_plate: plate.to_string(),
        created_at: now,
    })
}

async fn get_car_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Car>> {
    let row = sqlx::query("SELECT id, user_id, license_plate, created_at FROM cars WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get car by id")?;

    row.map(|row| row_to_car_sqlite(&row)).transpose()
}

async fn list_cars_by_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Car>> {
    let rows = sqlx::query(
        "SELECT id, user_id, license_plate, created_at FROM cars WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list cars")?;

    rows.iter().map(row_to_car_sqlite).collect()
}

async fn find_car_by_plate_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    plate: &str,
) -> Result<Option<Car>> {
    let row = sqlx::query(
        "SELECT id, user_id, license_plate, created_at FROM cars WHERE user_id = ? AND license_plate = ?",
    )
    .bind(user_id)
    .bind(plate)
    .fetch_optional(pool)
    .await
    .context("Failed to find car by plate")?;

    row.map(|row| row_to_car_sqlite(&row)).transpose()
}

async fn delete_car_sqlite(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cars WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete car")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_car_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Car> {
    Ok(Car {
        id: row.get("id"),
        user_id: row.get("user_id"),
        license_plate: row.get("license_plate"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_car_mysql(pool: &MySqlPool, user_id: i64, plate: &str) -> Result<Car> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO cars (user_id, license_plate, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(plate)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create car")?;

    Ok(Car {
        id: result.last_insert_id() as i64,
        user_id,
        license_plate: plate.to_string(),
        created_at: now,
    })
}

async fn get_car_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Car>> {
    let row = sqlx::query("SELECT id, user_id, license_plate, created_at FROM cars WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get car by id")?;

    row.map(|row| row_to_car_mysql(&row)).transpose()
}

async fn list_cars_by_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Car>> {
    let rows = sqlx::query(
        "SELECT id, user_id, license_plate, created_at FROM cars WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list cars")?;

    rows.iter().map(row_to_car_mysql).collect()
}

async fn find_car_by_plate_mysql(
    pool: &MySqlPool,
    user_id: i64,
    plate: &str,
) -> Result<Option<Car>> {
    let row = sqlx::query(
        "SELECT id, user_id, license_plate, created_at FROM cars WHERE user_id = ? AND license_plate = ?",
    )
    .bind(user_id)
    .bind(plate)
    .fetch_optional(pool)
    .await
    .context("Failed to find car by plate")?;

    row.map(|row| row_to_car_mysql(&row)).transpose()
}

async fn delete_car_mysql(pool: &MySqlPool, id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cars WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete car")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_car_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Car> {
    Ok(Car {
        id: row.get("id"),
        user_id: row.get("user_id"),
        license_plate: row.get("license_plate"),
        created_at: row.get("created_at"),
    })
}
