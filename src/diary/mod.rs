//! Diary entries and their emotion analysis.
mod emotion;
mod pipeline;
mod repository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::article::Article;

pub use emotion::{Emotion, EmotionTally, split_clauses, summary};
pub use pipeline::DiaryPipeline;
pub use repository::{DiaryRow, DiaryStore, PgDiaryStore};

/// Entries considered by the emotion summary.
pub const SUMMARY_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: Uuid,
    pub title: String,
    /// As written by the user.
    pub content: String,
    /// English version used for classification.
    pub translated_content: String,
    pub emotion: Emotion,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
}

/// Fields a diary edit may carry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiaryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl DiaryPatch {
    /// Apply every field set on the patch.
    pub fn merge(self, entry: &mut DiaryEntry) {
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(content) = self.content {
            entry.content = content;
        }
    }
}

/// How an entry is analysed.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    /// Translate to English before classifying.
    pub translate: bool,
    /// Skip classification and use this emotion.
    pub forced_emotion: Option<Emotion>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            translate: true,
            forced_emotion: None,
        }
    }
}

/// Entry returned with its reading recommendations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryWithArticles {
    #[serde(flatten)]
    pub entry: DiaryEntry,
    pub articles: Vec<Article>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_patch() {
        let now = Utc::now();
        let mut entry = DiaryEntry {
            id: Uuid::new_v4(),
            title: "Monday".into(),
            content: "Aku sedih".into(),
            translated_content: "I am sad".into(),
            emotion: Emotion::Sadness,
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        DiaryPatch {
            title: Some("Tuesday".into()),
            content: None,
        }
        .merge(&mut entry);

        assert_eq!(entry.title, "Tuesday");
        assert_eq!(entry.content, "Aku sedih");
    }
}
