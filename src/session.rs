//! Login sessions.
//!
//! One row per login. A refresh token stays usable as long as its row exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_agent: String,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new [`Session`].
    pub fn new(
        user_id: Uuid,
        user_agent: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            user_agent: user_agent.into(),
            valid: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence port for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Sessions of one user, oldest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>>;

    /// Returns whether a row was removed.
    async fn revoke(&self, id: Uuid) -> Result<bool>;
}

/// PostgreSQL [`SessionStore`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new [`PgSessionStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO sessions (id, user_id, user_agent, valid, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.user_agent)
        .bind(session.valid)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            r#"SELECT id, user_id, user_agent, valid, created_at, updated_at
                FROM sessions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            r#"SELECT id, user_id, user_agent, valid, created_at, updated_at
                FROM sessions WHERE user_id = $1 ORDER BY created_at"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn revoke(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
