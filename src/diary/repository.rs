//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::decode_rows;
use crate::diary::DiaryEntry;
use crate::error::{Result, ServerError};

/// Persistence port for diary entries.
#[async_trait]
pub trait DiaryStore: Send + Sync {
    async fn insert_entry(&self, entry: &DiaryEntry) -> Result<()>;

    /// `CorruptRecord` when the stored row cannot be decoded.
    async fn find_entry(&self, id: Uuid) -> Result<Option<DiaryEntry>>;

    /// Every entry, corrupted rows skipped.
    async fn list_entries(&self) -> Result<Vec<DiaryEntry>>;

    /// Most recent entries of one user first.
    async fn recent_by_owner(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>>;

    async fn update_entry(&self, entry: &DiaryEntry) -> Result<()>;

    /// Returns whether a row was removed.
    async fn delete_entry(&self, id: Uuid) -> Result<bool>;
}

/// Raw `diaries` row.
#[derive(Clone, Debug, PartialEq, FromRow)]
pub struct DiaryRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub translated_content: String,
    pub emotion: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DiaryEntry> for DiaryRow {
    fn from(entry: &DiaryEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            translated_content: entry.translated_content.clone(),
            emotion: entry.emotion.to_string(),
            user_id: entry.user_id,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

impl TryFrom<DiaryRow> for DiaryEntry {
    type Error = ServerError;

    fn try_from(row: DiaryRow) -> Result<Self> {
        let emotion = row.emotion.parse().map_err(|details| {
            ServerError::CorruptRecord {
                collection: "diary",
                id: row.id.to_string(),
                details,
            }
        })?;

        Ok(DiaryEntry {
            id: row.id,
            title: row.title,
            content: row.content,
            translated_content: row.translated_content,
            emotion,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_DIARY: &str = r#"SELECT id, title, content, translated_content, emotion, user_id, created_at, updated_at
    FROM diaries"#;

/// PostgreSQL [`DiaryStore`].
#[derive(Clone)]
pub struct PgDiaryStore {
    pool: PgPool,
}

impl PgDiaryStore {
    /// Create a new [`PgDiaryStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiaryStore for PgDiaryStore {
    async fn insert_entry(&self, entry: &DiaryEntry) -> Result<()> {
        let row = DiaryRow::from(entry);
        sqlx::query(
            r#"INSERT INTO diaries (id, title, content, translated_content, emotion, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(row.id)
        .bind(row.title)
        .bind(row.content)
        .bind(row.translated_content)
        .bind(row.emotion)
        .bind(row.user_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<DiaryEntry>> {
        let sql = format!("{SELECT_DIARY} WHERE id = $1");
        sqlx::query_as::<_, DiaryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(DiaryEntry::try_from)
            .transpose()
    }

    async fn list_entries(&self) -> Result<Vec<DiaryEntry>> {
        let sql = format!("{SELECT_DIARY} ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, DiaryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }

    async fn recent_by_owner(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>> {
        let sql = format!(
            "{SELECT_DIARY} WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, DiaryRow>(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }

    async fn update_entry(&self, entry: &DiaryEntry) -> Result<()> {
        let row = DiaryRow::from(entry);
        sqlx::query(
            r#"UPDATE diaries
                SET title = $1, content = $2, translated_content = $3, emotion = $4, updated_at = $5
                WHERE id = $6"#,
        )
        .bind(row.title)
        .bind(row.content)
        .bind(row.translated_content)
        .bind(row.emotion)
        .bind(row.updated_at)
        .bind(row.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_entry(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM diaries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
