//! Deterministic translator and classifier for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Classifier, Prediction, Translation, Translator};
use crate::diary::Emotion;
use crate::error::Result;

/// Dictionary translator. Unknown texts come back unchanged.
#[derive(Default)]
pub struct StubTranslator {
    dictionary: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StubTranslator {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            dictionary: entries
                .into_iter()
                .map(|(from, to)| (from.to_owned(), to.to_owned()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, text: &str, _target: &str) -> Result<Translation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Translation {
            text: self
                .dictionary
                .get(text)
                .cloned()
                .unwrap_or_else(|| text.to_owned()),
            source_language: Some("id".into()),
        })
    }
}

/// Scores a clause by the first keyword it contains.
///
/// Clauses without keyword score zero everywhere.
#[derive(Default)]
pub struct KeywordClassifier {
    calls: AtomicUsize,
}

impl KeywordClassifier {
    const KEYWORDS: [(&'static str, Emotion); 6] = [
        ("sad", Emotion::Sadness),
        ("happy", Emotion::Joy),
        ("angry", Emotion::Anger),
        ("afraid", Emotion::Fear),
        ("love", Emotion::Love),
        ("wow", Emotion::Surprise),
    ];

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn score(&self, clause: &str) -> Prediction {
        let clause = clause.to_lowercase();
        let mut scores = vec![0.0; Emotion::ALL.len()];
        let found = Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| clause.contains(keyword));
        if let Some((_, emotion)) = found {
            if let Some(index) = Emotion::ALL.iter().position(|e| e == emotion) {
                scores[index] = 0.9;
            }
        }
        Prediction { scores }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn labels(&self) -> &[Emotion] {
        &Emotion::ALL
    }

    async fn predict(&self, clauses: &[String]) -> Result<Vec<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(clauses.iter().map(|clause| self.score(clause)).collect())
    }
}
