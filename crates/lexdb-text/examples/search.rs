use std::env;
use std::path::{Path, PathBuf};

use lexdb_text::{IndexStore, QueryParser};

// Query an existing lexdb store and print ranked hits.
// Usage:
//   cargo run -p lexdb-text --example search -- "your query" \
//     [--index ../dev_data/indexes/lexdb] [--limit 10] [--stats]

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: cargo run -p lexdb-text --example search -- <query> [--index DIR] [--limit N] [--stats]");
        std::process::exit(1);
    }
    let mut query = String::new();
    let mut index_dir: Option<PathBuf> = None;
    let mut limit: usize = 10;
    let mut show_stats = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" => {
                if i + 1 >= args.len() { eprintln!("--index requires a path"); std::process::exit(2); }
                index_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--limit" => {
                if i + 1 >= args.len() { eprintln!("--limit requires a number"); std::process::exit(2); }
                limit = args[i + 1].parse().unwrap_or(limit);
                i += 2; continue;
            }
            "--stats" => { show_stats = true; i += 1; continue; }
            s if s.starts_with("--") => {
                eprintln!("Unknown flag: {}", s); std::process::exit(2);
            }
            s => {
                if query.is_empty() { query = s.to_string(); }
                i += 1; continue;
            }
        }
    }

    if query.is_empty() {
        eprintln!("Missing <query> argument");
        std::process::exit(1);
    }

    // flag > LEXDB_INDEX_DIR > workspace-relative fallback
    let index_dir = if let Some(id) = index_dir {
        id
    } else if let Ok(env_path) = env::var("LEXDB_INDEX_DIR") {
        PathBuf::from(env_path)
    } else {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors().nth(2)
            .unwrap_or(Path::new("."));
        base.join("dev_data/indexes/lexdb")
    };

    println!("lexdb search\n============");
    println!("Index: {}", index_dir.display());
    println!("Query: {} (limit {})\n", query, limit);

    let store = IndexStore::open(&index_dir)?;
    let snapshot = store.snapshot();
    let parsed = QueryParser::for_content(store.analyzer().clone()).parse(&query)?;
    for hit in snapshot.search(&parsed.query, limit) {
        let Some(doc) = snapshot.document(hit.doc_id) else { continue };
        let snippet: String = doc.content.chars().take(120).collect();
        println!("{:>2}. score={:.3} id={} tokens={}\n    snippet: {}",
            hit.rank + 1, hit.score, hit.doc_id, doc.token_count, snippet);
    }

    if show_stats {
        println!("\nStats:");
        println!("  documents     -> {}", snapshot.num_docs());
        println!("  segments      -> {}", snapshot.num_segments());
        println!("  avg field len -> {:.2}", snapshot.avg_field_len());
    }

    Ok(())
}
