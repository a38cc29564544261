//! Clients for the translation service and the emotion model.
mod tensorflow;
#[cfg(test)]
pub mod testing;
mod tokenizer;
mod translate;

use async_trait::async_trait;

use crate::diary::Emotion;
use crate::error::ServerError;

pub use tensorflow::TensorflowClassifier;
pub use tokenizer::{Padding, Tokenizer};
pub use translate::GoogleTranslator;

/// Output of a [`Translator`].
#[derive(Clone, Debug, PartialEq)]
pub struct Translation {
    pub text: String,
    /// Language detected by the service, when it reports one.
    pub source_language: Option<String>,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target` (ISO 639-1).
    async fn translate(
        &self,
        text: &str,
        target: &str,
    ) -> crate::error::Result<Translation>;
}

/// Scores of one clause, in the classifier's label order.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Index of the highest score. Ties go to the lowest index.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in self.scores.iter().enumerate() {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Label of each output position.
    fn labels(&self) -> &[Emotion];

    /// One [`Prediction`] per clause.
    async fn predict(
        &self,
        clauses: &[String],
    ) -> crate::error::Result<Vec<Prediction>>;
}

/// Network failures and 5xx answers may succeed later; anything else won't.
pub(crate) fn upstream_error(
    service: &'static str,
    err: reqwest::Error,
) -> ServerError {
    let transient = err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || err.status().is_some_and(|status| status.is_server_error());

    if transient {
        ServerError::ServiceUnavailable {
            service,
            details: err.to_string(),
        }
    } else {
        ServerError::internal(format!("{service} request failed"), err)
    }
}
