//! lexdb-tokens
//!
//! Token-count estimators used to charge documents against a retrieval token
//! budget. Counts are approximate and computed over the content field only.

use anyhow::{anyhow, Result};
use std::sync::Arc;

use lexdb_core::config::{expand_path, TokenSettings};
use lexdb_core::TokenCounter;

#[cfg(feature = "hf-tokenizer")]
mod hf;
#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenCounter;

/// Estimates tokens from whitespace-separated words, assuming a fixed number of
/// words per model token (0.75 for typical BPE vocabularies on English text).
#[derive(Debug, Clone)]
pub struct WordRatioCounter {
    words_per_token: f32,
}

impl WordRatioCounter {
    pub fn new(words_per_token: f32) -> Result<Self> {
        if !(words_per_token.is_finite() && words_per_token > 0.0) {
            return Err(anyhow!("words_per_token must be positive, got {words_per_token}"));
        }
        Ok(Self { words_per_token })
    }
}

impl Default for WordRatioCounter {
    fn default() -> Self { Self { words_per_token: 0.75 } }
}

impl TokenCounter for WordRatioCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let word_count = text.split_whitespace().count();
        Ok((word_count as f32 / self.words_per_token) as usize)
    }

    fn name(&self) -> &str { "word-ratio" }
}

/// Picks the configured counter: a Hugging Face tokenizer when
/// `tokens.tokenizer_file` is set, the word-ratio estimate otherwise.
pub fn get_default_counter(settings: &TokenSettings) -> Result<Arc<dyn TokenCounter>> {
    match settings.tokenizer_file.as_deref() {
        Some(file) => load_tokenizer_file(file),
        None => {
            tracing::debug!("using word-ratio token estimate");
            Ok(Arc::new(WordRatioCounter::default()))
        }
    }
}

#[cfg(feature = "hf-tokenizer")]
fn load_tokenizer_file(file: &str) -> Result<Arc<dyn TokenCounter>> {
    Ok(Arc::new(HfTokenCounter::from_file(expand_path(file))?))
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_tokenizer_file(file: &str) -> Result<Arc<dyn TokenCounter>> {
    Err(anyhow!(
        "tokenizer file {} configured but lexdb-tokens was built without the `hf-tokenizer` feature",
        expand_path(file).display()
    ))
}
