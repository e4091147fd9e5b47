use anyhow::{anyhow, Result};
use std::path::Path;
use tokenizers::Tokenizer;

use lexdb_core::TokenCounter;

/// Exact token counts from a Hugging Face `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    name: String,
}

impl HfTokenCounter {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
        tracing::info!(tokenizer = %path.display(), "loaded tokenizer");
        Ok(Self { tokenizer, name: format!("hf:{}", path.display()) })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let enc = self.tokenizer.encode(text, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(enc.get_ids().len())
    }

    fn name(&self) -> &str { &self.name }
}
