//! Word-level tokenizer compatible with the Keras `Tokenizer` JSON export.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Characters Keras strips from text before splitting.
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Token id used for padding.
pub const PAD_ID: u32 = 0;

#[derive(Debug, Deserialize)]
struct TokenizerArtifact {
    config: TokenizerArtifactConfig,
}

#[derive(Debug, Deserialize)]
struct TokenizerArtifactConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_lower")]
    lower: bool,
    #[serde(default = "default_split")]
    split: String,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: WordIndexField,
}

/// Keras stores `word_index` as a JSON-encoded string; accept a plain object too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordIndexField {
    Encoded(String),
    Map(HashMap<String, u32>),
}

fn default_filters() -> String {
    DEFAULT_FILTERS.to_string()
}

fn default_lower() -> bool {
    true
}

fn default_split() -> String {
    " ".to_string()
}

/// Maps sentences to fixed-length sequences of vocabulary ids.
#[derive(Debug, Clone)]
pub struct SentenceTokenizer {
    word_index: HashMap<String, u32>,
    num_words: Option<usize>,
    filters: String,
    lower: bool,
    split: String,
    oov_index: Option<u32>,
}

impl SentenceTokenizer {
    /// Load a tokenizer from a Keras `Tokenizer.to_json()` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", path.display());
        }
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse the Keras tokenizer JSON export.
    pub fn from_json(data: &str) -> Result<Self> {
        let artifact: TokenizerArtifact = serde_json::from_str(data)?;
        let config = artifact.config;
        let word_index = match config.word_index {
            WordIndexField::Encoded(encoded) => serde_json::from_str(&encoded)?,
            WordIndexField::Map(map) => map,
        };
        if word_index.is_empty() {
            anyhow::bail!("Tokenizer vocabulary is empty");
        }
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
        })
    }

    /// Build a tokenizer directly from a vocabulary with default settings.
    pub fn from_word_index(
        words: impl IntoIterator<Item = (String, u32)>,
        num_words: Option<usize>,
    ) -> Self {
        Self {
            word_index: words.into_iter().collect(),
            num_words,
            filters: default_filters(),
            lower: true,
            split: default_split(),
            oov_index: None,
        }
    }

    /// Number of entries in the vocabulary.
    pub fn vocab_size(&self) -> usize {
        self.word_index.len()
    }

    /// Largest id this tokenizer can emit.
    pub fn max_id(&self) -> u32 {
        let max = self.word_index.values().copied().max().unwrap_or(PAD_ID);
        match self.num_words {
            Some(limit) => max.min(limit.saturating_sub(1) as u32),
            None => max,
        }
    }

    /// Split text into words after lowercasing and filtering.
    pub fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let mut cleaned = String::with_capacity(text.len());
        for c in text.chars() {
            if self.filters.contains(c) {
                cleaned.push_str(&self.split);
            } else {
                cleaned.push(c);
            }
        }
        cleaned
            .split(self.split.as_str())
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Encode text into vocabulary ids, dropping unknown and rare words.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::new();
        for word in self.words(text) {
            match self.word_index.get(&word) {
                Some(&id) if self.num_words.is_some_and(|limit| id as usize >= limit) => {
                    if let Some(oov) = self.oov_index {
                        ids.push(oov);
                    }
                }
                Some(&id) => ids.push(id),
                None => {
                    if let Some(oov) = self.oov_index {
                        ids.push(oov);
                    }
                }
            }
        }
        ids
    }

    /// Encode a batch of texts into `maxlen`-long sequences.
    pub fn encode_padded(&self, texts: &[String], maxlen: usize) -> Vec<Vec<u32>> {
        texts
            .iter()
            .map(|text| pad_sequence(self.encode(text), maxlen))
            .collect()
    }
}

/// Truncate and pad at the end to exactly `maxlen` ids.
pub fn pad_sequence(mut ids: Vec<u32>, maxlen: usize) -> Vec<u32> {
    ids.truncate(maxlen);
    ids.resize(maxlen, PAD_ID);
    ids
}

/// Normalize a raw caption line: trim, lowercase and collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
