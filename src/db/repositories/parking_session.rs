//! Parking session repository
//!
//! Database operations for parking sessions. Two operations exist for the
//! reminder subsystem specifically:
//! - `find_active` feeds the startup recovery sweep
//! - `update_status` only transitions rows that are still `active`, so the
//!   expiry write and a concurrent manual completion can never both win

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ParkingSession, ParkingSessionStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Filters for listing a user's sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only sessions with this status
    pub status: Option<ParkingSessionStatus>,
    /// Only sessions for this car
    pub car_id: Option<i64>,
    /// Only sessions started on this UTC day
    pub day: Option<NaiveDate>,
}

/// Parking session repository trait
#[async_trait]
pub trait ParkingSessionRepository: Send + Sync {
    /// Insert a new session
    async fn create(&self, session: &ParkingSession) -> Result<ParkingSession>;

    /// Get session by id
    async fn get_by_id(&self, id: &str) -> Result<Option<ParkingSession>>;

    /// Transition a session out of `active`; returns false when the session
    /// was missing or had already left `active`
    async fn update_status(&self, id: &str, status: ParkingSessionStatus) -> Result<bool>;

    /// All sessions still `active`, regardless of owner
    async fn find_active(&self) -> Result<Vec<ParkingSession>>;

    /// List a user's sessions, newest first
    async fn list_by_user(&self, user_id: i64, filter: &SessionFilter)
        -> Result<Vec<ParkingSession>>;
}

/// SQLx-based parking session repository implementation
pub struct SqlxParkingSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxParkingSessionRepository {
    /// Create a new SQLx parking session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ParkingSessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ParkingSessionRepository for SqlxParkingSessionRepository {
    async fn create(&self, session: &ParkingSession) -> Result<ParkingSession> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_session_sqlite(self.pool.as_sqlite().unwrap(), session).await
            }
            DatabaseDriver::Mysql => {
                create_session_mysql(self.pool.as_mysql().unwrap(), session).await
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ParkingSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_session_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn update_status(&self, id: &str, status: ParkingSessionStatus) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_status_sqlite(self.pool.as_sqlite().unwrap(), id, status).await
            }
            DatabaseDriver::Mysql => {
                update_status_mysql(self.pool.as_mysql().unwrap(), id, status).await
            }
        }
    }

    async fn find_active(&self) -> Result<Vec<ParkingSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_active_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => find_active_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        filter: &SessionFilter,
    ) -> Result<Vec<ParkingSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, filter).await
            }
            DatabaseDriver::Mysql => {
                list_by_user_mysql(self.pool.as_mysql().unwrap(), user_id, filter).await
            }
        }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, car_id, parking_location_id, latitude, longitude, \
     start_time, end_time, status, created_at";

/// Build the filtered listing query; placeholders match the bind order in
/// the per-driver listing functions.
fn build_list_query(filter: &SessionFilter) -> String {
    let mut sql = format!(
        "SELECT {} FROM parking_sessions WHERE user_id = ?",
        SELECT_COLUMNS
    );
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.car_id.is_some() {
        sql.push_str(" AND car_id = ?");
    }
    if filter.day.is_some() {
        sql.push_str(" AND start_time >= ? AND start_time < ?");
    }
    sql.push_str(" ORDER BY start_time DESC");
    sql
}

/// UTC bounds of the given day, for the start_time range filter
fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(
    pool: &SqlitePool,
    session: &ParkingSession,
) -> Result<ParkingSession> {
    sqlx::query(
        r#"
        INSERT INTO parking_sessions
            (id, user_id, car_id, parking_location_id, latitude, longitude,
             start_time, end_time, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.car_id)
    .bind(session.parking_location_id)
    .bind(session.latitude)
    .bind(session.longitude)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.status.to_string())
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create parking session")?;

    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<ParkingSession>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM parking_sessions WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get parking session by id")?;

    row.map(|row| row_to_session_sqlite(&row)).transpose()
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: &str,
    status: ParkingSessionStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE parking_sessions SET status = ? WHERE id = ? AND status = 'active'")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update parking session status")?;

    Ok(result.rows_affected() > 0)
}

async fn find_active_sqlite(pool: &SqlitePool) -> Result<Vec<ParkingSession>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parking_sessions WHERE status = 'active'",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to query active parking sessions")?;

    rows.iter().map(row_to_session_sqlite).collect()
}

async fn list_by_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    filter: &SessionFilter,
) -> Result<Vec<ParkingSession>> {
    let sql = build_list_query(filter);
    let mut query = sqlx::query(&sql).bind(user_id);
    if let Some(status) = filter.status {
        query = query.bind(status.to_string());
    }
    if let Some(car_id) = filter.car_id {
        query = query.bind(car_id);
    }
    if let Some(day) = filter.day {
        let (start, end) = day_bounds(day);
        query = query.bind(start).bind(end);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list parking sessions")?;

    rows.iter().map(row_to_session_sqlite).collect()
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ParkingSession> {
    let status: String = row.get("status");
    Ok(ParkingSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        car_id: row.get("car_id"),
        parking_location_id: row.get("parking_location_id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        status: status.parse::<ParkingSessionStatus>().map_err(|e| anyhow!(e))?,
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(
    pool: &MySqlPool,
    session: &ParkingSession,
) -> Result<ParkingSession> {
    sqlx::query(
        r#"
        INSERT INTO parking_sessions
            (id, user_id, car_id, parking_location_id, latitude, longitude,
             start_time, end_time, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.car_id)
    .bind(session.parking_location_id)
    .bind(session.latitude)
    .bind(session.longitude)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.status.to_string())
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create parking session")?;

    Ok(session.clone())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<ParkingSession>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM parking_sessions WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get parking session by id")?;

    row.map(|row| row_to_session_mysql(&row)).transpose()
}

async fn update_status_mysql(
    pool: &MySqlPool,
    id: &str,
    status: ParkingSessionStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE parking_sessions SET status = ? WHERE id = ? AND status = 'active'")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update parking session status")?;

    Ok(result.rows_affected() > 0)
}

async fn find_active_mysql(pool: &MySqlPool) -> Result<Vec<ParkingSession>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM parking_sessions WHERE status = 'active'",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to query active parking sessions")?;

    rows.iter().map(row_to_session_mysql).collect()
}

async fn list_by_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    filter: &SessionFilter,
) -> Result<Vec<ParkingSession>> {
    let sql = build_list_query(filter);
    let mut query = sqlx::query(&sql).bind(user_id);
    if let Some(status) = filter.status {
        query = query.bind(status.to_string());
    }
    if let Some(car_id) = filter.car_id {
        query = query.bind(car_id);
    }
    if let Some(day) = filter.day {
        let (start, end) = day_bounds(day);
        query = query.bind(start).bind(end);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list parking sessions")?;

    rows.iter().map(row_to_session_mysql).collect()
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ParkingSession> {
    let status: String = row.get("status");
    Ok(ParkingSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        car_id: row.get("car_id"),
        parking_location_id: row.get("parking_location_id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        status: status.parse::<ParkingSessionStatus>().map_err(|e| anyhow!(e))?,
        created_at: row.get("created_at"),
    })
}
