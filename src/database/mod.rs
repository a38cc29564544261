//! database (db) union structure.
mod memory;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryDatabase;

use crate::article::{ArticleStore, PgArticleStore};
use crate::config;
use crate::diary::{DiaryStore, PgDiaryStore};
use crate::error::{Result, ServerError};
use crate::session::{PgSessionStore, SessionStore};
use crate::user::{CredentialStore, PgCredentialStore};

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "emodiary";
pub const DEFAULT_POOL_SIZE: u32 = 10;

const UNIQUE_VIOLATION: &str = "23505";

/// Every persistence port used by the services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub diaries: Arc<dyn DiaryStore>,
    pub articles: Arc<dyn ArticleStore>,
}

impl Stores {
    /// Connect to PostgreSQL and run pending migrations.
    pub async fn postgres(config: &config::Postgres) -> Result<Self> {
        let hostname = &config.address;
        let username = config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password = config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let db = config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        tracing::info!(%hostname, %db, "postgres connected");

        // execute migrations scripts on start.
        sqlx::migrate!().run(&pool).await.map_err(sqlx::Error::from)?;

        Ok(Self {
            users: Arc::new(PgCredentialStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            diaries: Arc::new(PgDiaryStore::new(pool.clone())),
            articles: Arc::new(PgArticleStore::new(pool)),
        })
    }

    /// Back every port with the same in-memory database.
    pub fn memory(db: Arc<MemoryDatabase>) -> Self {
        Self {
            users: db.clone(),
            sessions: db.clone(),
            diaries: db.clone(),
            articles: db,
        }
    }
}

/// Map unique constraint violations onto [`ServerError::Conflict`].
///
/// `message` receives the violated constraint name.
pub(crate) fn map_unique(
    err: sqlx::Error,
    message: impl FnOnce(&str) -> String,
) -> ServerError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return ServerError::Conflict(message(db.constraint().unwrap_or_default()));
        }
    }
    err.into()
}

/// Decode rows, logging and skipping the ones that are corrupted.
pub(crate) fn decode_rows<R, T>(rows: impl IntoIterator<Item = R>) -> Vec<T>
where
    T: TryFrom<R, Error = ServerError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(error = %err, "skipping corrupted record");
                None
            },
        })
        .collect()
}
