//! Turns a directory of `.txt` files into paragraph-sized documents.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::traits::TokenCounter;
use crate::types::{Document, FieldValue};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    counter: Arc<dyn TokenCounter>,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self { chunking_config, counter }
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            tracing::info!(limit, "limited ingestion to first files");
        }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Document>> {
        if files.is_empty() {
            tracing::info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path);
            let category = self.get_facet_from_path(file_path, data_dir);
            all_chunks.extend(self.chunk_content(&content, &doc_id, file_path, &category)?);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "processed directory");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_doc_id(&self, file_path: &Path) -> String {
        file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
    }

    fn get_facet_from_path(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        match relative_path.parent().and_then(Path::to_str) {
            Some(facet) if !facet.is_empty() => format!("/{facet}"),
            _ => "/misc".to_string(),
        }
    }

    fn chunk_content(&self, content: &str, doc_id: &str, file_path: &Path, category: &str) -> Result<Vec<Document>> {
        let mut texts = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() { continue; }
            if self.counter.count_tokens(paragraph)? <= self.chunking_config.max_tokens {
                texts.push(paragraph.to_string());
            } else {
                texts.extend(self.split_paragraph_with_overlap(paragraph)?);
            }
        }
        let total_chunks = i32::try_from(texts.len()).unwrap_or(i32::MAX);
        let doc_path = file_path.to_string_lossy().to_string();
        let documents = texts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| {
                Document::new(text)
                    .with_metadata("doc_id", doc_id)
                    .with_metadata("doc_path", doc_path.as_str())
                    .with_metadata("category", category)
                    .with_metadata("chunk_index", FieldValue::Int(i32::try_from(chunk_index).unwrap_or(i32::MAX)))
                    .with_metadata("total_chunks", FieldValue::Int(total_chunks))
            })
            .collect();
        Ok(documents)
    }

    /// Windows of words no larger than `max_tokens` by the configured counter.
    /// A single word over the limit still becomes its own chunk.
    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Result<Vec<String>> {
        let max_tokens = self.chunking_config.max_tokens;
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        // first guess at roughly 0.75 words per token
        let words_per_chunk = (max_tokens * 3 / 4).max(1);
        let overlap_words = (words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize;
        let overlap_words = overlap_words.min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = (start + words_per_chunk).min(words.len());
            let mut chunk = words[start..end].join(" ");
            while end - start > 1 && self.counter.count_tokens(&chunk)? > max_tokens {
                end -= ((end - start) / 10).max(1);
                chunk = words[start..end].join(" ");
            }
            chunks.push(chunk);
            if end >= words.len() {
                break;
            }
            start = end.saturating_sub(overlap_words).max(start + 1);
        }
        Ok(chunks)
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
            .map(|e| e.path().to_path_buf())
            .collect();
        txt_files.sort();
        txt_files
    }
}
