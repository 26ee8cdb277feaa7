//! Parking location repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateParkingLocationInput, FeeClassification, ParkingLocation};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Parking location repository trait
#[async_trait]
pub trait ParkingLocationRepository: Send + Sync {
    /// Register a new location owned by `owner_user_id`
    async fn create(
        &self,
        owner_user_id: i64,
        input: &CreateParkingLocationInput,
    ) -> Result<ParkingLocation>;

    /// Get location by id
    async fn get_by_id(&self, id: i64) -> Result<Option<ParkingLocation>>;

    /// List locations visible to a user: their own plus active public ones
    async fn list_visible_to(&self, user_id: i64) -> Result<Vec<ParkingLocation>>;
}

/// SQLx-based parking location repository implementation
pub struct SqlxParkingLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxParkingLocationRepository {
    /// Create a new SQLx parking location repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ParkingLocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ParkingLocationRepository for SqlxParkingLocationRepository {
    async fn create(
        &self,
        owner_user_id: i64,
        input: &CreateParkingLocationInput,
    ) -> Result<ParkingLocation> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_location_sqlite(self.pool.as_sqlite().unwrap(), owner_user_id, input).await
            }
            DatabaseDriver::Mysql => {
                create_location_mysql(self.pool.as_mysql().unwrap(), owner_user_id, input).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ParkingLocation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_location_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_location_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn list_visible_to(&self, user_id: i64) -> Result<Vec<ParkingLocation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_visible_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => list_visible_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }
}

const SELECT_COLUMNS: &str = "id, owner_user_id, location_name, latitude, longitude, \
     fee_classification, max_stay, no_return_time, is_public, is_active, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_location_sqlite(
    pool: &SqlitePool,
    owner_user_id: i64,
    input: &CreateParkingLocationInput,
) -> Result<ParkingLocation> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO parking_locations
            (owner_user_id, location_name, latitude, longitude, fee_classification,
             max_stay, no_return_time, is_public, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(owner_user_id)
    .bind(&input.location_name)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.fee_classification.to_string())
    .bind(input.max_stay)
    .bind(input.no_return_time)
    .bind(input.is_public)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create parking location")?;

    Ok(ParkingLocation {
        id: result.last_insert_rowid(),
        owner_user_id,
        location_name: input.location_name.clone(),
        latitude: input.latitude,
        longitude: input.longitude,
        fee_classification: input.fee_classification,
        max_stay: input.max_stay,
        no_return_time: input.no_return_time,
        is_public: input.is_public,
        is_active: true,
        created_at: now,
    })
}

async fn get_location_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<ParkingLocation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM parking_locations WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get parking location by id")?;

    row.map(|row| row_to_location_sqlite(&row)).transpose()
}

async fn list_visible_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<ParkingLocation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parking_locations \
         WHERE owner_user_id = ? OR (is_public = 1 AND is_active = 1) \
         ORDER BY created_at",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list parking locations")?;

    rows.iter().map(row_to_location_sqlite).collect()
}

fn row_to_location_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ParkingLocation> {
    let fee: String = row.get("fee_classification");
    Ok(ParkingLocation {
        id: row.get("id"),
        owner_user_id: row.get("owner_user_id"),
        location_name: row.get("location_name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        fee_classification: fee.parse::<FeeClassification>().map_err(|e| anyhow!(e))?,
        max_stay: row.get("max_stay"),
        no_return_time: row.get("no_return_time"),
        is_public: row.get("is_public"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_location_mysql(
    pool: &MySqlPool,
    owner_user_id: i64,
    input: &CreateParkingLocationInput,
) -> Result<ParkingLocation> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO parking_locations
            (owner_user_id, location_name, latitude, longitude, fee_classification,
             max_stay, no_return_time, is_public, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(owner_user_id)
    .bind(&input.location_name)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.fee_classification.to_string())
    .bind(input.max_stay)
    .bind(input.no_return_time)
    .bind(input.is_public)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create parking location")?;

    Ok(ParkingLocation {
        id: result.last_insert_id() as i64,
        owner_user_id,
        location_name: input.location_name.clone(),
        latitude: input.latitude,
        longitude: input.longitude,
        fee_classification: input.fee_classification,
        max_stay: input.max_stay,
        no_return_time: input.no_return_time,
        is_public: input.is_public,
        is_active: true,
        created_at: now,
    })
}

async fn get_location_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<ParkingLocation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM parking_locations WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get parking location by id")?;

    row.map(|row| row_to_location_mysql(&row)).transpose()
}

async fn list_visible_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<ParkingLocation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parking_locations \
         WHERE owner_user_id = ? OR (is_public = 1 AND is_active = 1) \
         ORDER BY created_at",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list parking locations")?;

    rows.iter().map(row_to_location_mysql).collect()
}

fn row_to_location_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ParkingLocation> {
    let fee: String = row.get("fee_classification");
    Ok(ParkingLocation {
        id: row.get("id"),
        owner_user_id: row.get("owner_user_id"),
        location_name: row.get("location_name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        fee_classification: fee.parse::<FeeClassification>().map_err(|e| anyhow!(e))?,
        max_stay: row.get("max_stay"),
        no_return_time: row.get("no_return_time"),
        is_public: row.get("is_public"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}
