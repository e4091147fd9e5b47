use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lexdb_core::data_processor::{ChunkingConfig, DataProcessor};
use lexdb_text::{IndexStore, StoreOptions};

// Append plain text files to a lexdb store.
// Usage:
//   cargo run -p lexdb-text --example index -- [--dir ../dev_data/txt] [--index ../dev_data/indexes/lexdb]
// Notes:
//   - Documents are appended; running twice indexes the files twice.
//   - Defaults resolve relative to the workspace root so you can run from anywhere.

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut index_dir: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => {
                if i + 1 >= args.len() { eprintln!("--dir requires a path"); std::process::exit(2); }
                data_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--index" => {
                if i + 1 >= args.len() { eprintln!("--index requires a path"); std::process::exit(2); }
                index_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            s if s.starts_with('-') => {
                eprintln!("Unknown flag: {}", s); std::process::exit(2);
            }
            _ => { i += 1; }
        }
    }

    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));

    // flag > env var > workspace defaults
    let data_dir = data_dir
        .or_else(|| env::var("LEXDB_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| ws_root.join("dev_data/txt"));
    let index_dir = index_dir
        .or_else(|| env::var("LEXDB_INDEX_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| ws_root.join("dev_data/indexes/lexdb"));

    println!("lexdb index\n===========");
    println!("Data dir : {}", data_dir.display());
    println!("Index dir: {}", index_dir.display());

    let options = StoreOptions::default();
    let processor = DataProcessor::new(ChunkingConfig::default(), Arc::clone(&options.token_counter));
    let documents = processor.process_directory(&data_dir)?;
    let store = IndexStore::open_with(&index_dir, options)?;
    for document in documents {
        store.add(document)?;
    }
    println!("Done. Store now holds {} documents.", store.snapshot().num_docs());
    Ok(())
}
