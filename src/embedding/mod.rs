//! Sentence embedding: tokenization and the frozen CNN encoder.

pub mod model;
pub mod tokenizer;

pub use model::SentenceEncoder;
pub use tokenizer::{normalize, SentenceTokenizer};
