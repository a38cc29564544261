//! In-memory database, used when no PostgreSQL instance is configured.
//!
//! Mirrors the relational constraints: unique email and phone, cascading
//! deletes from users to sessions and diaries.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::article::{Article, ArticleQuery, ArticleStore};
use crate::database::decode_rows;
use crate::diary::{DiaryEntry, DiaryRow, DiaryStore, Emotion};
use crate::error::{Result, ServerError};
use crate::session::{Session, SessionStore};
use crate::user::{CredentialStore, EMAIL_CONFLICT, PHONE_CONFLICT, User};

#[derive(Default)]
struct State {
    users: Vec<User>,
    sessions: Vec<Session>,
    diaries: Vec<DiaryRow>,
    articles: Vec<Article>,
}

impl State {
    /// Uniqueness check, ignoring the user being updated.
    fn check_unique(&self, user: &User) -> Result<()> {
        let others = self.users.iter().filter(|u| u.id != user.id);
        for other in others {
            if other.email == user.email {
                return Err(ServerError::Conflict(EMAIL_CONFLICT.into()));
            }
            if user.phone.is_some() && other.phone == user.phone {
                return Err(ServerError::Conflict(PHONE_CONFLICT.into()));
            }
        }
        Ok(())
    }
}

/// Same order as `ORDER BY created_at DESC, id DESC`.
fn newest_first(a: &DiaryRow, b: &DiaryRow) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: RwLock<State>,
}

impl MemoryDatabase {
    /// Load articles into the catalog.
    pub async fn add_articles(&self, articles: impl IntoIterator<Item = Article>) {
        self.state.write().await.articles.extend(articles);
    }

    /// Store a row as is, bypassing decoding.
    #[cfg(test)]
    pub async fn insert_raw_diary(&self, row: DiaryRow) {
        self.state.write().await.diaries.push(row);
    }
}

#[async_trait]
impl CredentialStore for MemoryDatabase {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_unique(user)?;
        state.users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_unique(user)?;
        if let Some(stored) = state.users.iter_mut().find(|u| u.id == user.id) {
            *stored = user.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Ok(false);
        }

        state.sessions.retain(|s| s.user_id != id);
        state.diaries.retain(|d| d.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryDatabase {
    async fn create(&self, session: &Session) -> Result<()> {
        self.state.write().await.sessions.push(session.clone());
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.id != id);
        Ok(state.sessions.len() != before)
    }
}

#[async_trait]
impl DiaryStore for MemoryDatabase {
    async fn insert_entry(&self, entry: &DiaryEntry) -> Result<()> {
        self.state.write().await.diaries.push(DiaryRow::from(entry));
        Ok(())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<DiaryEntry>> {
        let state = self.state.read().await;
        state
            .diaries
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .map(DiaryEntry::try_from)
            .transpose()
    }

    async fn list_entries(&self) -> Result<Vec<DiaryEntry>> {
        let mut rows = self.state.read().await.diaries.clone();
        rows.sort_by(newest_first);
        Ok(decode_rows(rows))
    }

    async fn recent_by_owner(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>> {
        let mut rows: Vec<DiaryRow> = self
            .state
            .read()
            .await
            .diaries
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        rows.truncate(limit);
        Ok(decode_rows(rows))
    }

    async fn update_entry(&self, entry: &DiaryEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.diaries.iter_mut().find(|d| d.id == entry.id) {
            *stored = DiaryRow::from(entry);
        }
        Ok(())
    }

    async fn delete_entry(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.diaries.len();
        state.diaries.retain(|d| d.id != id);
        Ok(state.diaries.len() != before)
    }
}

#[async_trait]
impl ArticleStore for MemoryDatabase {
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .state
            .read()
            .await
            .articles
            .iter()
            .filter(|a| query.emotions.is_empty() || query.emotions.contains(&a.emotion))
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            (a.emotion.as_str(), a.position).cmp(&(b.emotion.as_str(), b.position))
        });

        Ok(match query.window() {
            Some((offset, limit)) => articles.into_iter().skip(offset).take(limit).collect(),
            None => articles,
        })
    }

    async fn by_emotion(
        &self,
        emotion: Emotion,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .state
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.emotion == emotion)
            .cloned()
            .collect();
        articles.sort_by_key(|a| a.position);
        articles.truncate(limit);
        Ok(articles)
    }
}
