//! Translate, classify and store diary entries.

use std::sync::Arc;

use uuid::Uuid;

use crate::article::{ArticleStore, RELATED_LIMIT};
use crate::clock::Clock;
use crate::diary::{
    DiaryEntry, DiaryPatch, DiaryStore, DiaryWithArticles, Emotion,
    EmotionTally, NewEntry, PipelineOptions, SUMMARY_LIMIT, split_clauses,
    summary,
};
use crate::error::{Result, ServerError};
use crate::ml::{Classifier, Translator};
use crate::retry::RetryPolicy;
use crate::user::User;

const NOT_OWNER: &str =
    "You are not allowed do this action because you are not the owner of this diary";

/// Diary use cases.
#[derive(Clone)]
pub struct DiaryPipeline {
    store: Arc<dyn DiaryStore>,
    articles: Arc<dyn ArticleStore>,
    translator: Arc<dyn Translator>,
    classifier: Arc<dyn Classifier>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    target_language: String,
}

impl DiaryPipeline {
    /// Create a new [`DiaryPipeline`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DiaryStore>,
        articles: Arc<dyn ArticleStore>,
        translator: Arc<dyn Translator>,
        classifier: Arc<dyn Classifier>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            store,
            articles,
            translator,
            classifier,
            retry,
            clock,
            target_language: target_language.into(),
        }
    }

    /// Only the owner and admins may act on `entry`.
    pub fn authorize(current: &User, entry: &DiaryEntry) -> Result<()> {
        if entry.user_id != current.id && !current.is_admin() {
            return Err(ServerError::Forbidden(NOT_OWNER.into()));
        }
        Ok(())
    }

    /// English version of `content`.
    async fn translate(&self, content: &str) -> Result<String> {
        let translator = &self.translator;
        let target = self.target_language.as_str();
        let translation = self
            .retry
            .run("translator", || translator.translate(content, target))
            .await?;

        metrics::counter!("diary_translations_total").increment(1);
        tracing::debug!(
            source = translation.source_language.as_deref().unwrap_or("unknown"),
            target,
            "diary translated"
        );
        Ok(translation.text)
    }

    /// One vote per clause, the most voted emotion wins.
    async fn classify(&self, text: &str) -> Result<Emotion> {
        let mut clauses: Vec<String> =
            split_clauses(text).into_iter().map(str::to_owned).collect();
        if clauses.is_empty() {
            clauses.push(text.trim().to_owned());
        }

        let classifier = &self.classifier;
        let clauses = &clauses;
        let predictions = self
            .retry
            .run("classifier", || classifier.predict(clauses))
            .await?;

        let labels = classifier.labels();
        let votes = predictions
            .iter()
            .map(|prediction| {
                prediction
                    .argmax()
                    .and_then(|index| labels.get(index).copied())
                    .ok_or_else(|| {
                        ServerError::internal(
                            "unexpected classifier output",
                            format!(
                                "{} scores for {} labels",
                                prediction.scores.len(),
                                labels.len()
                            ),
                        )
                    })
            })
            .collect::<Result<EmotionTally>>()?;

        metrics::counter!("diary_classifications_total").increment(1);
        votes.winner().ok_or_else(|| {
            ServerError::internal("empty classifier output", "no prediction")
        })
    }

    /// Translated content and its emotion.
    async fn analyse(
        &self,
        content: &str,
        options: &PipelineOptions,
    ) -> Result<(String, Emotion)> {
        let translated = if options.translate {
            self.translate(content).await?
        } else {
            content.to_owned()
        };

        let emotion = match options.forced_emotion {
            Some(emotion) => emotion,
            None => self.classify(&translated).await?,
        };

        Ok((translated, emotion))
    }

    pub async fn create_entry(
        &self,
        owner: Uuid,
        new: NewEntry,
        options: PipelineOptions,
    ) -> Result<DiaryEntry> {
        let (translated_content, emotion) =
            self.analyse(&new.content, &options).await?;

        let now = self.clock.now();
        let entry = DiaryEntry {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            translated_content,
            emotion,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_entry(&entry).await?;

        tracing::info!(id = %entry.id, %emotion, "diary created");
        Ok(entry)
    }

    /// Merge `patch` into `entry`. New content is analysed again.
    pub async fn update_entry(
        &self,
        mut entry: DiaryEntry,
        patch: DiaryPatch,
        options: PipelineOptions,
    ) -> Result<DiaryEntry> {
        if let Some(content) = &patch.content {
            let (translated_content, emotion) =
                self.analyse(content, &options).await?;
            entry.translated_content = translated_content;
            entry.emotion = emotion;
        } else if let Some(emotion) = options.forced_emotion {
            entry.emotion = emotion;
        }

        patch.merge(&mut entry);
        entry.updated_at = self.clock.now();
        self.store.update_entry(&entry).await?;

        Ok(entry)
    }

    pub async fn get(&self, id: Uuid) -> Result<DiaryEntry> {
        self.store.find_entry(id).await?.ok_or_else(|| {
            ServerError::NotFound(format!("There is no diary with id {id}"))
        })
    }

    pub async fn list(&self) -> Result<Vec<DiaryEntry>> {
        self.store.list_entries().await
    }

    /// Dominant emotion of the owner's latest entries.
    pub async fn summary(&self, owner: Uuid) -> Result<Option<Emotion>> {
        let entries = self.store.recent_by_owner(owner, SUMMARY_LIMIT).await?;
        Ok(summary(entries.iter().map(|e| e.emotion), SUMMARY_LIMIT))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_entry(id).await? {
            return Err(ServerError::NotFound(format!(
                "There is no diary with id {id}"
            )));
        }
        Ok(())
    }

    /// Attach articles sharing the entry's emotion.
    pub async fn with_articles(
        &self,
        entry: DiaryEntry,
    ) -> Result<DiaryWithArticles> {
        let articles = self
            .articles
            .by_emotion(entry.emotion, RELATED_LIMIT)
            .await?;
        Ok(DiaryWithArticles { entry, articles })
    }
}
