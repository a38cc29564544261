//! Word tokenizer matching the Keras `Tokenizer` the model was trained with.
//!
//! The vocabulary is loaded once and shared read-only.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Result, ServerError};

const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Side on which sequences are padded and truncated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Padding {
    Pre,
    #[default]
    Post,
}

impl FromStr for Padding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Padding::Pre),
            "post" => Ok(Padding::Post),
            _ => Err(format!("padding must be `pre` or `post`, got `{s}`")),
        }
    }
}

#[derive(Deserialize)]
struct KerasTokenizer {
    config: KerasConfig,
}

#[derive(Deserialize)]
struct KerasConfig {
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_lower")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    oov_token: Option<String>,
    word_index: WordIndex,
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_owned()
}

fn default_lower() -> bool {
    true
}

fn default_split() -> String {
    " ".to_owned()
}

/// `to_json()` stores the index as an embedded JSON string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WordIndex {
    Encoded(String),
    Map(HashMap<String, u32>),
}

#[derive(Clone, Debug)]
pub struct Tokenizer {
    word_index: HashMap<String, u32>,
    num_words: Option<usize>,
    filters: String,
    lower: bool,
    split: String,
    oov_index: Option<u32>,
    max_length: usize,
    padding: Padding,
}

impl Tokenizer {
    /// Parse a tokenizer exported with `tokenizer.to_json()`.
    pub fn from_json(
        json: &str,
        max_length: usize,
        padding: Padding,
    ) -> Result<Self> {
        let parsed: KerasTokenizer = serde_json::from_str(json)
            .map_err(|err| ServerError::internal("invalid tokenizer file", err))?;
        let config = parsed.config;

        let word_index = match config.word_index {
            WordIndex::Map(map) => map,
            WordIndex::Encoded(raw) => serde_json::from_str(&raw).map_err(
                |err| ServerError::internal("invalid tokenizer word index", err),
            )?,
        };
        let oov_index = config
            .oov_token
            .as_ref()
            .and_then(|token| word_index.get(token).copied());

        Ok(Self {
            word_index,
            num_words: config.num_words,
            filters: config.filters,
            lower: config.lower,
            split: config.split,
            oov_index,
            max_length,
            padding,
        })
    }

    /// Read the tokenizer file from disk.
    pub fn load(
        path: impl AsRef<Path>,
        max_length: usize,
        padding: Padding,
    ) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            ServerError::internal(
                format!("cannot read tokenizer `{}`", path.display()),
                err,
            )
        })?;

        let tokenizer = Self::from_json(&json, max_length, padding)?;
        tracing::info!(
            path = %path.display(),
            vocabulary = tokenizer.word_index.len(),
            "tokenizer loaded"
        );
        Ok(tokenizer)
    }

    /// Word indices of `text`, unknown words mapped to the OOV index if any.
    pub fn text_to_sequence(&self, text: &str) -> Vec<u32> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_owned()
        };
        let text: String = text
            .chars()
            .map(|c| {
                if self.filters.contains(c) {
                    self.split.clone()
                } else {
                    c.to_string()
                }
            })
            .collect();

        text.split(self.split.as_str())
            .filter(|word| !word.is_empty())
            .filter_map(|word| match self.word_index.get(word) {
                Some(&index)
                    if self.num_words.is_none_or(|n| (index as usize) < n) =>
                {
                    Some(index)
                },
                _ => self.oov_index,
            })
            .collect()
    }

    /// Sequence padded with zeros, or truncated, to the model input length.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut sequence = self.text_to_sequence(text);

        if sequence.len() > self.max_length {
            match self.padding {
                Padding::Pre => {
                    sequence.drain(..sequence.len() - self.max_length);
                },
                Padding::Post => sequence.truncate(self.max_length),
            }
        }

        let missing = self.max_length - sequence.len();
        match self.padding {
            Padding::Pre => {
                let mut padded = vec![0; missing];
                padded.extend(sequence);
                padded
            },
            Padding::Post => {
                sequence.resize(self.max_length, 0);
                sequence
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKENIZER: &str = r##"{
        "class_name": "Tokenizer",
        "config": {
            "num_words": 6,
            "filters": "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n",
            "lower": true,
            "split": " ",
            "char_level": false,
            "oov_token": "<OOV>",
            "document_count": 3,
            "word_index": "{\"<OOV>\": 1, \"i\": 2, \"am\": 3, \"very\": 4, \"happy\": 5, \"sad\": 6}"
        }
    }"##;

    #[test]
    fn test_text_to_sequence() {
        let tokenizer = Tokenizer::from_json(TOKENIZER, 8, Padding::Post).unwrap();

        assert_eq!(tokenizer.text_to_sequence("I am very happy!"), vec![2, 3, 4, 5]);
        // unknown word and word beyond `num_words` both become OOV.
        assert_eq!(tokenizer.text_to_sequence("I am sad, truly"), vec![2, 3, 1, 1]);
    }

    #[test]
    fn test_padding() {
        let post = Tokenizer::from_json(TOKENIZER, 6, Padding::Post).unwrap();
        assert_eq!(post.encode("I am happy"), vec![2, 3, 5, 0, 0, 0]);

        let pre = Tokenizer::from_json(TOKENIZER, 6, Padding::Pre).unwrap();
        assert_eq!(pre.encode("I am happy"), vec![0, 0, 0, 2, 3, 5]);
    }

    #[test]
    fn test_truncating() {
        let post = Tokenizer::from_json(TOKENIZER, 2, Padding::Post).unwrap();
        assert_eq!(post.encode("I am very happy"), vec![2, 3]);

        let pre = Tokenizer::from_json(TOKENIZER, 2, Padding::Pre).unwrap();
        assert_eq!(pre.encode("I am very happy"), vec![4, 5]);
    }

    #[test]
    fn test_inline_word_index() {
        let json = r#"{"config": {"oov_token": null, "word_index": {"happy": 1}}}"#;
        let tokenizer = Tokenizer::from_json(json, 3, Padding::Post).unwrap();

        assert_eq!(tokenizer.encode("Happy? unknown"), vec![1, 0, 0]);
    }

    #[test]
    fn test_invalid_padding() {
        assert!("middle".parse::<Padding>().is_err());
        assert_eq!("pre".parse::<Padding>(), Ok(Padding::Pre));
    }
}
