//! Session and password reset repositories
//!
//! Both tables hold short-lived credentials keyed back to `users`:
//! - `SessionRepository`: login sessions, looked up by token
//! - `PasswordResetRepository`: one-time reset tickets, looked up by token hash

use crate::db::{Backend, DynDatabasePool};
use crate::models::{PasswordReset, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let sql = "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .context("Failed to create session")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .context("Failed to create session")?;
            }
        }
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_session_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_session_mysql(pool, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        execute_with_str(&self.pool, "DELETE FROM sessions WHERE id = ?", id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql).bind(user_id).execute(pool).await
                    .context("Failed to delete sessions by user")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql).bind(user_id).execute(pool).await
                    .context("Failed to delete sessions by user")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(now).execute(pool).await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(now).execute(pool).await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset>;

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>>;

    /// Stamp `used_at` if the ticket is still unused and unexpired.
    ///
    /// Returns whether this call consumed it. Of two concurrent callers
    /// only one sees `true`.
    async fn mark_used(&self, id: i64) -> Result<bool>;

    /// Drop outstanding tickets of a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset> {
        let sql = r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(token_hash)
                .bind(expires_at)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create password reset")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(token_hash)
                .bind(expires_at)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create password reset")?
                .last_insert_id() as i64,
        };

        Ok(PasswordReset {
            id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: now,
        })
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_reset_sqlite(pool, token_hash).await,
            Backend::Mysql(pool) => get_reset_mysql(pool, token_hash).await,
        }
    }

    async fn mark_used(&self, id: i64) -> Result<bool> {
        let sql = "UPDATE password_resets SET used_at = ? \
                   WHERE id = ? AND used_at IS NULL AND expires_at >= ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(now)
                .bind(id)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to mark password reset used")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(now)
                .bind(id)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to mark password reset used")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let sql = "DELETE FROM password_resets WHERE user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql).bind(user_id).execute(pool).await
                    .context("Failed to delete password resets")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql).bind(user_id).execute(pool).await
                    .context("Failed to delete password resets")?;
            }
        }
        Ok(())
    }
}

async fn execute_with_str(pool: &DynDatabasePool, sql: &str, value: &str) -> Result<u64> {
    let affected = match pool.backend() {
        Backend::Sqlite(pool) => sqlx::query(sql).bind(value).execute(pool).await?.rows_affected(),
        Backend::Mysql(pool) => sqlx::query(sql).bind(value).execute(pool).await?.rows_affected(),
    };
    Ok(affected)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn get_reset_sqlite(pool: &SqlitePool, token_hash: &str) -> Result<Option<PasswordReset>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, expires_at, used_at, created_at
        FROM password_resets
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to get password reset")?;

    Ok(row.map(|row| PasswordReset {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        expires_at: row.get("expires_at"),
        used_at: row.get("used_at"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn get_reset_mysql(pool: &MySqlPool, token_hash: &str) -> Result<Option<PasswordReset>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token_hash, expires_at, used_at, created_at
        FROM password_resets
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .context("Failed to get password reset")?;

    Ok(row.map(|row| PasswordReset {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        expires_at: row.get("expires_at"),
        used_at: row.get("used_at"),
        created_at: row.get("created_at"),
    }))
}
