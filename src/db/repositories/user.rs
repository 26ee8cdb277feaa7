//! User repository
//!
//! Database operations for user accounts. Only the notification linkage is
//! managed here; credentials live in the upstream auth gateway.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, email: &str) -> Result<User>;

    /// Get user by id
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find the user holding a pending connection code
    async fn find_by_connection_code(&self, code: &str) -> Result<Option<User>>;

    /// Store a fresh connection code on the user
    async fn set_connection_code(&self, user_id: i64, code: &str) -> Result<()>;

    /// Link a Telegram chat to the user and burn the connection code
    async fn link_telegram(&self, user_id: i64, chat_id: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, email: &str) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.as_sqlite().unwrap(), email).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.as_mysql().unwrap(), email).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => get_user_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn find_by_connection_code(&self, code: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_by_connection_code_sqlite(self.pool.as_sqlite().unwrap(), code).await
            }
            DatabaseDriver::Mysql => {
                find_by_connection_code_mysql(self.pool.as_mysql().unwrap(), code).await
            }
        }
    }

    async fn set_connection_code(&self, user_id: i64, code: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_connection_code_sqlite(self.pool.as_sqlite().unwrap(), user_id, code).await
            }
            DatabaseDriver::Mysql => {
                set_connection_code_mysql(self.pool.as_mysql().unwrap(), user_id, code).await
            }
        }
    }

    async fn link_telegram(&self, user_id: i64, chat_id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                link_telegram_sqlite(self.pool.as_sqlite().unwrap(), user_id, chat_id).await
            }
            DatabaseDriver::Mysql => {
                link_telegram_mysql(self.pool.as_mysql().unwrap(), user_id, chat_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, email: &str) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO users (email, created_at) VALUES (?, ?)")
        .bind(email)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        email: email.to_string(),
        telegram_chat_id: None,
        connection_code: None,
        created_at: now,
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, telegram_chat_id, connection_code, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by id")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn find_by_connection_code_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, telegram_chat_id, connection_code, created_at FROM users WHERE connection_code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to find user by connection code")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn set_connection_code_sqlite(pool: &SqlitePool, user_id: i64, code: &str) -> Result<()> {
    sqlx::query("UPDATE users SET connection_code = ? WHERE id = ?")
        .bind(code)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to set connection code")?;

    Ok(())
}

async fn link_telegram_sqlite(pool: &SqlitePool, user_id: i64, chat_id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET telegram_chat_id = ?, connection_code = NULL WHERE id = ?")
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to link telegram chat")?;

    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, email: &str) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO users (email, created_at) VALUES (?, ?)")
        .bind(email)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        email: email.to_string(),
        telegram_chat_id: None,
        connection_code: None,
        created_at: now,
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, telegram_chat_id, connection_code, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by id")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn find_by_connection_code_mysql(pool: &MySqlPool, code: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, telegram_chat_id, connection_code, created_at FROM users WHERE connection_code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to find user by connection code")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn set_connection_code_mysql(pool: &MySqlPool, user_id: i64, code: &str) -> Result<()> {
    sqlx::query("UPDATE users SET connection_code = ? WHERE id = ?")
        .bind(code)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to set connection code")?;

    Ok(())
}

async fn link_telegram_mysql(pool: &MySqlPool, user_id: i64, chat_id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET telegram_chat_id = ?, connection_code = NULL WHERE id = ?")
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to link telegram chat")?;

    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        telegram_chat_id: row.get("telegram_chat_id"),
        connection_code: row.get("connection_code"),
        created_at: row.get("created_at"),
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        telegram_chat_id: row.get("telegram_chat_id"),
        connection_code: row.get("connection_code"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let user = repo.create("driver@example.com").await.expect("create");
        assert!(user.id > 0);

        let found = repo
            .get_by_id(user.id)
            .await
            .expect("get")
            .expect("user not found");
        assert_eq!(found.email, "driver@example.com");
        assert!(found.telegram_chat_id.is_none());
        assert!(found.connection_code.is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let repo = setup_test_repo().await;

        let found = repo.get_by_id(9999).await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_connection_code_lookup_and_burn() {
        let repo = setup_test_repo().await;
        let user = repo.create("driver@example.com").await.expect("create");

        repo.set_connection_code(user.id, "CONNECT_AB12CD34")
            .await
            .expect("set code");

        let found = repo
            .find_by_connection_code("CONNECT_AB12CD34")
            .await
            .expect("find")
            .expect("code not found");
        assert_eq!(found.id, user.id);

        repo.link_telegram(user.id, "555001").await.expect("link");

        let linked = repo.get_by_id(user.id).await.expect("get").expect("user");
        assert_eq!(linked.telegram_chat_id.as_deref(), Some("555001"));
        // Code is burned on linking
        assert!(linked.connection_code.is_none());
        assert!(repo
            .find_by_connection_code("CONNECT_AB12CD34")
            .await
            .expect("find")
            .is_none());
    }
}
