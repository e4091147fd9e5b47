use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lexdb_core::config::{expand_path, Config, Settings};
use lexdb_core::data_processor::{ChunkingConfig, DataProcessor};
use lexdb_core::{FieldValue, Metadata};
use lexdb_retriever::{Retriever, RetrieverConfig};
use lexdb_text::{IndexStore, StoreOptions};

const DEFAULT_INDEX_DIR: &str = "../dev_data/indexes/lexdb";
const DEFAULT_DATA_DIR: &str = "../dev_data/txt";

const USAGE: &str = "Usage: lexdb [--index DIR] <command> [args...]
Commands:
  ingest [DIR] [--limit N]                        index .txt files under DIR
  add <TEXT> [--meta KEY=VALUE]...                add one document
  query <TEXT> [--top N] [--max-tokens N] [--match-all]
  stats                                           show index statistics";

fn usage_exit() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(1)
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v,
        None => { eprintln!("{flag} requires a value"); std::process::exit(2) }
    }
}

fn parse_count(value: &str, flag: &str) -> anyhow::Result<usize> {
    value.parse::<usize>().with_context(|| format!("{flag} expects a non-negative number, got '{value}'"))
}

/// `KEY=VALUE`; integers become Int (or Long when too large), decimals Double.
fn parse_meta(arg: &str) -> anyhow::Result<(String, FieldValue)> {
    let (key, raw) = arg.split_once('=').ok_or_else(|| anyhow!("--meta expects KEY=VALUE, got '{arg}'"))?;
    let value = if let Ok(v) = raw.parse::<i32>() {
        FieldValue::Int(v)
    } else if let Ok(v) = raw.parse::<i64>() {
        FieldValue::Long(v)
    } else if let Some(v) = raw.parse::<f64>().ok().filter(|v| v.is_finite()) {
        FieldValue::Double(v)
    } else {
        FieldValue::from(raw)
    };
    Ok((key.to_string(), value))
}

fn open_store(index_dir: &Path, settings: &Settings) -> anyhow::Result<IndexStore> {
    let options = StoreOptions::from_settings(settings)?;
    IndexStore::open_with(index_dir, options).with_context(|| format!("opening index at {}", index_dir.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut index_dir: Option<PathBuf> = None;
    if args.first().map(String::as_str) == Some("--index") {
        index_dir = Some(PathBuf::from(flag_value(&args, 0, "--index")));
        args.drain(..2);
    }
    if args.is_empty() { usage_exit(); }
    let cmd = args.remove(0);

    // flag > store.path > default
    let index_dir = index_dir
        .or_else(|| settings.store.path.as_deref().map(expand_path))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_DIR));
    tracing::debug!(command = %cmd, index = %index_dir.display(), "starting");

    match cmd.as_str() {
        "ingest" => {
            let mut data_dir = None; let mut limit = None;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--limit" => { limit = Some(parse_count(flag_value(&args, i, "--limit"), "--limit")?); i += 2; continue; }
                    s if s.starts_with('-') => { eprintln!("Unknown flag: {}", s); std::process::exit(2); }
                    s => { data_dir = Some(PathBuf::from(s)); i += 1; }
                }
            }
            let data_dir = data_dir
                .or_else(|| settings.ingest.data_dir.as_deref().map(expand_path))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

            let store = open_store(&index_dir, &settings)?;
            let chunking = ChunkingConfig { max_tokens: settings.ingest.max_chunk_tokens, ..ChunkingConfig::default() };
            let processor = DataProcessor::new(chunking, Arc::clone(&store.options().token_counter));
            println!("Ingesting {} -> {}", data_dir.display(), index_dir.display());
            let documents = match limit {
                Some(limit) => processor.process_directory_limited(&data_dir, limit)?,
                None => processor.process_directory(&data_dir)?,
            };

            let pb = ProgressBar::new(documents.len() as u64);
            pb.set_style(ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                .progress_chars("#>-"));
            for document in documents {
                store.add(document)?;
                pb.inc(1);
            }
            pb.finish_with_message("done");
            println!("✅ Ingest complete ({} documents in store)", store.snapshot().num_docs());
        }
        "add" => {
            let mut text: Option<String> = None; let mut metadata = Metadata::new();
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--meta" => { let (k, v) = parse_meta(flag_value(&args, i, "--meta"))?; metadata.insert(k, v); i += 2; continue; }
                    s if s.starts_with("--") => { eprintln!("Unknown flag: {}", s); std::process::exit(2); }
                    s => { if text.is_none() { text = Some(s.to_string()); } i += 1; }
                }
            }
            let Some(text) = text else { usage_exit() };
            let store = open_store(&index_dir, &settings)?;
            let doc_id = store.add_content(text, metadata)?;
            println!("Added document {}", doc_id);
        }
        "query" => {
            let mut text: Option<String> = None;
            let mut retriever_config = RetrieverConfig::from(&settings.retriever);
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--top" => { retriever_config.top_n_matches = parse_count(flag_value(&args, i, "--top"), "--top")?; i += 2; continue; }
                    "--max-tokens" => { retriever_config.max_tokens = parse_count(flag_value(&args, i, "--max-tokens"), "--max-tokens")?; i += 2; continue; }
                    "--match-all" => { retriever_config.only_matches = false; i += 1; }
                    s if s.starts_with("--") => { eprintln!("Unknown flag: {}", s); std::process::exit(2); }
                    s => { if text.is_none() { text = Some(s.to_string()); } i += 1; }
                }
            }
            let Some(text) = text else { usage_exit() };
            let store = Arc::new(open_store(&index_dir, &settings)?);
            let retriever = Retriever::builder(store).config(retriever_config).build()?;
            let results = retriever.try_retrieve(&text)?;
            if results.is_empty() { println!("No results."); }
            for (rank, r) in results.iter().enumerate() {
                let snippet: String = r.text.chars().take(120).collect();
                let meta: Vec<String> = r.metadata.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("{:>2}. score={:.3} {}\n    {}", rank + 1, r.score, meta.join(" "), snippet);
            }
        }
        "stats" => {
            let store = open_store(&index_dir, &settings)?;
            let snapshot = store.snapshot();
            println!("Index        : {}", store.dir().display());
            println!("Documents    : {}", snapshot.num_docs());
            println!("Segments     : {}", snapshot.num_segments());
            println!("Avg field len: {:.2}", snapshot.avg_field_len());
            println!("Token counter: {}", store.options().token_counter.name());
        }
        _ => { eprintln!("Unknown command: {}", cmd); usage_exit(); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_values_keep_their_type() {
        assert_eq!(parse_meta("page=3").unwrap(), ("page".to_string(), FieldValue::Int(3)));
        assert_eq!(parse_meta("size=9999999999").unwrap().1, FieldValue::Long(9_999_999_999));
        assert_eq!(parse_meta("ratio=0.5").unwrap().1, FieldValue::Double(0.5));
        assert_eq!(parse_meta("name=doc1").unwrap().1, FieldValue::from("doc1"));
        assert_eq!(parse_meta("odd=NaN").unwrap().1, FieldValue::from("NaN"));
        assert!(parse_meta("missing").is_err());
    }
}
