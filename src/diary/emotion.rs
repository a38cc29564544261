//! Emotion labels and vote counting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Emotion detected in a diary entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sadness,
    Joy,
    Anger,
    Fear,
    Love,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Sadness,
        Emotion::Joy,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Love,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Sadness => "sadness",
            Emotion::Joy => "joy",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Love => "love",
            Emotion::Surprise => "surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown emotion `{s}`"))
    }
}

/// Split text into clauses on `?`, `.` and `!`.
///
/// Blank clauses are dropped.
pub fn split_clauses(text: &str) -> Vec<&str> {
    text.split(['?', '.', '!'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect()
}

/// Vote counter remembering the order in which emotions first appear.
#[derive(Clone, Debug, Default)]
pub struct EmotionTally {
    counts: Vec<(Emotion, usize)>,
}

impl EmotionTally {
    pub fn add(&mut self, emotion: Emotion) {
        match self.counts.iter_mut().find(|(e, _)| *e == emotion) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((emotion, 1)),
        }
    }

    /// Most voted emotion. Ties go to the one seen first.
    pub fn winner(&self) -> Option<Emotion> {
        let mut best: Option<(Emotion, usize)> = None;
        for &(emotion, count) in &self.counts {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((emotion, count));
            }
        }
        best.map(|(emotion, _)| emotion)
    }
}

impl FromIterator<Emotion> for EmotionTally {
    fn from_iter<I: IntoIterator<Item = Emotion>>(iter: I) -> Self {
        let mut tally = Self::default();
        for emotion in iter {
            tally.add(emotion);
        }
        tally
    }
}

/// Mode of the first `limit` emotions.
pub fn summary(
    emotions: impl IntoIterator<Item = Emotion>,
    limit: usize,
) -> Option<Emotion> {
    emotions.into_iter().take(limit).collect::<EmotionTally>().winner()
}
