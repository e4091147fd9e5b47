use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

use lexdb_core::data_processor::{ChunkingConfig, DataProcessor};
use lexdb_core::{FieldValue, TokenCounter};

struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> { Ok(text.split_whitespace().count()) }
    fn name(&self) -> &str { "words" }
}

/// Charges two tokens per word, more than the 0.75 words-per-token guess.
struct DenseCounter;

impl TokenCounter for DenseCounter {
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> { Ok(text.split_whitespace().count() * 2) }
    fn name(&self) -> &str { "dense" }
}

fn processor(max_tokens: usize) -> DataProcessor {
    DataProcessor::new(ChunkingConfig { max_tokens, overlap_percent: 0.2 }, Arc::new(WordCounter))
}

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let docs = processor(500).process_directory(dir).expect("process");

    assert_eq!(docs.len(), 1, "one small paragraph becomes one document");
    assert_eq!(docs[0].content, "Short text");
    assert_eq!(docs[0].metadata["doc_id"], FieldValue::from("a"));
    assert_eq!(docs[0].metadata["category"], FieldValue::from("/misc"));
    assert_eq!(docs[0].metadata["total_chunks"], FieldValue::Int(1));
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let docs = processor(500).process_directory_limited(dir, 1).expect("process limited");

    let doc_ids: HashSet<String> = docs.iter().map(|d| d.metadata["doc_id"].to_string()).collect();
    assert_eq!(doc_ids.len(), 1, "limited to one source document");
}

#[test]
fn long_paragraph_is_split_with_overlap() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("topic");
    fs::create_dir_all(&dir).unwrap();
    let words: Vec<String> = (0..20).map(|i| format!("w{i}")).collect();
    fs::write(dir.join("long.txt"), words.join(" ")).unwrap();

    // 8 tokens -> 6 words per chunk, 1 word of overlap
    let docs = processor(8).process_directory(tmp.path()).expect("process");

    assert_eq!(docs.len(), 4);
    assert!(docs[0].content.starts_with("w0 "));
    assert!(docs[1].content.starts_with("w5 "), "second chunk repeats the overlap word");
    assert_eq!(docs[3].metadata["chunk_index"], FieldValue::Int(3));
    assert_eq!(docs[0].metadata["category"], FieldValue::from("/topic"));
}

#[test]
fn split_chunks_respect_the_configured_counter() {
    let tmp = TempDir::new().unwrap();
    let words: Vec<String> = (0..20).map(|i| format!("w{i}")).collect();
    fs::write(tmp.path().join("long.txt"), words.join(" ")).unwrap();

    let processor = DataProcessor::new(ChunkingConfig { max_tokens: 10, overlap_percent: 0.2 }, Arc::new(DenseCounter));
    let docs = processor.process_directory(tmp.path()).expect("process");

    assert!(docs.len() > 1);
    for doc in &docs {
        let tokens = DenseCounter.count_tokens(&doc.content).unwrap();
        assert!(tokens <= 10, "chunk {:?} has {tokens} tokens", doc.content);
    }
    assert!(docs[0].content.starts_with("w0 "));
    assert!(docs.last().unwrap().content.ends_with(" w19"));
}

#[test]
fn non_txt_files_are_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.md"), "ignored").unwrap();
    let docs = processor(500).process_directory(tmp.path()).expect("process");
    assert!(docs.is_empty());
}
