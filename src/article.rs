//! Reading recommendations matched to an emotion.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::database::decode_rows;
use crate::diary::Emotion;
use crate::error::{Result, ServerError};

/// Articles attached to a diary entry.
pub const RELATED_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleLanguage {
    Id,
    En,
}

impl fmt::Display for ArticleLanguage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArticleLanguage::Id => write!(f, "id"),
            ArticleLanguage::En => write!(f, "en"),
        }
    }
}

impl FromStr for ArticleLanguage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "id" => Ok(ArticleLanguage::Id),
            "en" => Ok(ArticleLanguage::En),
            _ => Err(format!("unknown article language `{s}`")),
        }
    }
}

/// Immutable catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub emotion: Emotion,
    pub language: ArticleLanguage,
    pub position: i32,
    pub title: String,
    pub link: String,
    pub displayed_link: String,
    pub snippet: Option<String>,
    pub date: Option<String>,
}

/// Raw `articles` row.
#[derive(Clone, Debug, FromRow)]
pub struct ArticleRow {
    pub id: String,
    pub emotion: String,
    pub language: String,
    pub position: i32,
    pub title: String,
    pub link: String,
    pub displayed_link: String,
    pub snippet: Option<String>,
    pub date: Option<String>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = ServerError;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let corrupt = |details: String| ServerError::CorruptRecord {
            collection: "article",
            id: row.id.clone(),
            details,
        };
        let emotion = row.emotion.parse().map_err(corrupt)?;
        let language = row.language.parse().map_err(corrupt)?;

        Ok(Article {
            id: row.id,
            emotion,
            language,
            position: row.position,
            title: row.title,
            link: row.link,
            displayed_link: row.displayed_link,
            snippet: row.snippet,
            date: row.date,
        })
    }
}

/// Listing filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArticleQuery {
    /// 1-based.
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Empty means every emotion.
    pub emotions: Vec<Emotion>,
}

impl ArticleQuery {
    /// `(offset, limit)` when both `page` and `size` are given.
    pub fn window(&self) -> Option<(usize, usize)> {
        let (page, size) = self.page.zip(self.size)?;
        let size = size as usize;
        Some((page.saturating_sub(1) as usize * size, size))
    }
}

/// Read access to the article catalog.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Ordered by emotion then position.
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    /// At most `limit` articles of one emotion, by position.
    async fn by_emotion(
        &self,
        emotion: Emotion,
        limit: usize,
    ) -> Result<Vec<Article>>;
}

const SELECT_ARTICLE: &str = r#"SELECT id, emotion, language, position, title, link, displayed_link, snippet, date
    FROM articles"#;

/// PostgreSQL [`ArticleStore`].
#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    /// Create a new [`PgArticleStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let emotions: Option<Vec<String>> = (!query.emotions.is_empty()).then(|| {
            query.emotions.iter().map(|e| e.as_str().to_owned()).collect()
        });
        let (offset, limit) = match query.window() {
            Some((offset, limit)) => (Some(offset as i64), Some(limit as i64)),
            None => (None, None),
        };

        let sql = format!(
            "{SELECT_ARTICLE} WHERE ($1::text[] IS NULL OR emotion = ANY($1))
                ORDER BY emotion, position LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(emotions)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }

    async fn by_emotion(
        &self,
        emotion: Emotion,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let sql =
            format!("{SELECT_ARTICLE} WHERE emotion = $1 ORDER BY position LIMIT $2");
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(emotion.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }
}
