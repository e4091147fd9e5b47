use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

use lexdb_core::{Document, FieldValue, IndexError, Metadata};
use lexdb_text::log::LOG_FILE_NAME;
use lexdb_text::{Analyzer, IndexStore, Query, QueryParser, Snapshot, StoreOptions};

const CORPUS: [&str; 4] = [
    "Lucene is a powerful search library.",
    "Is Lucinity is not a library?",
    "BM25Similarity is the default search term similarity algorithm.",
    "Aaaaah - some random text here.",
];

fn fill(store: &IndexStore) {
    for text in CORPUS {
        store.add(Document::new(text)).expect("add");
    }
}

fn search(snapshot: &Snapshot, text: &str, limit: usize) -> Vec<u64> {
    let query = QueryParser::for_content(Analyzer::standard()).parse(text).expect("parse").into_query();
    snapshot.search(&query, limit).into_iter().map(|h| h.doc_id).collect()
}

#[test]
fn documents_survive_reopen_and_ids_continue() {
    let dir = TempDir::new().unwrap();
    {
        let store = IndexStore::open(dir.path()).unwrap();
        fill(&store);
        store.add(Document::new("tagged").with_metadata("source", "a").with_metadata("page", 3)).unwrap();
    }

    let store = IndexStore::open(dir.path()).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.num_docs(), 5);
    let tagged = snapshot.document(4).expect("doc 4");
    assert_eq!(tagged.metadata["source"], FieldValue::from("a"));
    assert_eq!(tagged.metadata["page"], FieldValue::Int(3));
    assert_eq!(search(&snapshot, "library", 10), vec![0, 1]);

    assert_eq!(store.add(Document::new("third session")).unwrap(), 5);
}

#[test]
fn torn_trailing_record_is_discarded() {
    let dir = TempDir::new().unwrap();
    {
        let store = IndexStore::open(dir.path()).unwrap();
        fill(&store);
    }
    let mut log = OpenOptions::new().append(true).open(dir.path().join(LOG_FILE_NAME)).unwrap();
    log.write_all(&200u32.to_le_bytes()).unwrap();
    log.write_all(b"{\"doc_id\":4").unwrap();
    drop(log);

    let store = IndexStore::open(dir.path()).unwrap();
    assert_eq!(store.snapshot().num_docs(), 4);
    assert_eq!(store.add(Document::new("after crash")).unwrap(), 4);
    drop(store);

    let reopened = IndexStore::open(dir.path()).unwrap();
    assert_eq!(reopened.snapshot().document(4).map(|d| d.content.clone()), Some("after crash".to_string()));
}

#[test]
fn merges_preserve_results() {
    let texts: Vec<String> = (0..40)
        .map(|i| match i % 4 {
            0 => format!("search library number {i}"),
            1 => format!("powerful engine {i}"),
            2 => format!("library of babel {i}"),
            _ => format!("plain filler text {i}"),
        })
        .collect();

    let unmerged = IndexStore::temporary_with(StoreOptions::default().with_merge_threshold(1000)).unwrap();
    let merged = IndexStore::temporary_with(StoreOptions::default().with_merge_threshold(3)).unwrap();
    for text in &texts {
        unmerged.add(Document::new(text.clone())).unwrap();
        merged.add(Document::new(text.clone())).unwrap();
    }
    assert_eq!(unmerged.snapshot().num_segments(), 40);
    assert!(merged.snapshot().num_segments() <= 3);

    for q in ["library", "search library", "+library -babel", "\"powerful engine\"", "filler OR babel"] {
        let a = unmerged.snapshot().search(&QueryParser::for_content(Analyzer::standard()).parse(q).unwrap().query, 50);
        let b = merged.snapshot().search(&QueryParser::for_content(Analyzer::standard()).parse(q).unwrap().query, 50);
        assert_eq!(a, b, "query {q:?}");
        assert!(!a.is_empty(), "query {q:?} should match");
    }
}

#[test]
fn snapshot_isolation_under_concurrent_adds() {
    let store = Arc::new(IndexStore::temporary().unwrap());
    fill(&store);
    let before = store.snapshot();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..20 {
                store.add(Document::new(format!("library copy {i}"))).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..20 {
                    let snapshot = store.snapshot();
                    let hits = search(&snapshot, "library", 100);
                    assert_eq!(hits.len() as u64, snapshot.doc_freq("library"));
                }
            })
        })
        .collect();
    writer.join().unwrap();
    readers.into_iter().for_each(|r| r.join().unwrap());

    assert_eq!(search(&before, "library", 100), vec![0, 1]);
    assert_eq!(store.snapshot().num_docs(), 24);
}

#[test]
fn concurrent_writers_get_unique_contiguous_ids() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 25;
    let total = (WRITERS * PER_WRITER) as u64;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(IndexStore::open(dir.path()).unwrap());

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..PER_WRITER)
                    .map(|i| store.add(Document::new(format!("writer {w} entry {i}"))).unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();
    let mut ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..total).collect::<Vec<_>>());

    let contents = |snapshot: &Snapshot| -> BTreeSet<String> {
        snapshot.doc_ids().filter_map(|id| snapshot.document(id).map(|d| d.content.clone())).collect()
    };
    let snapshot = store.snapshot();
    assert_eq!(snapshot.num_docs(), total);
    assert_eq!(snapshot.doc_freq("writer"), total);
    let written = contents(&snapshot);
    assert_eq!(written.len(), WRITERS * PER_WRITER);
    drop(store);

    let reopened = IndexStore::open(dir.path()).unwrap();
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.doc_ids().collect::<Vec<_>>(), (0..total).collect::<Vec<_>>());
    assert_eq!(contents(&snapshot), written);
}

#[test]
fn second_open_of_same_directory_is_refused() {
    let dir = TempDir::new().unwrap();
    let first = IndexStore::open(dir.path()).unwrap();
    first.add(Document::new("alpha document from the first store")).unwrap();

    let err = IndexStore::open(dir.path()).unwrap_err();
    assert!(matches!(err, IndexError::Locked(_)), "got {err:?}");
    assert_eq!(first.add(Document::new("beta")).unwrap(), 1);
    drop(first);

    let reopened = IndexStore::open(dir.path()).unwrap();
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.num_docs(), 2);
    assert_eq!(search(&snapshot, "alpha", 10), vec![0]);
}

#[test]
fn rejected_documents_are_not_stored() {
    let dir = TempDir::new().unwrap();
    {
        let store = IndexStore::open(dir.path()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("content".to_string(), FieldValue::from("shadow"));
        assert!(matches!(store.add_content("text", metadata), Err(IndexError::ReservedField(_))));
        let err = store.add(Document::new("text").with_metadata("weight", f32::INFINITY)).unwrap_err();
        assert!(matches!(err, IndexError::InvalidDocument(_)));
    }
    let store = IndexStore::open(dir.path()).unwrap();
    assert_eq!(store.snapshot().num_docs(), 0);
}

#[test]
fn query_syntax_against_corpus() {
    let store = IndexStore::temporary().unwrap();
    fill(&store);
    let snapshot = store.snapshot();

    assert_eq!(search(&snapshot, "+search +library", 10), vec![0]);
    assert_eq!(search(&snapshot, "library -lucene", 10), vec![1]);
    assert_eq!(search(&snapshot, "library AND NOT lucinity", 10), vec![0]);
    assert_eq!(search(&snapshot, "\"search library\"", 10), vec![0]);
    assert!(search(&snapshot, "\"library search\"", 10).is_empty());
    assert!(search(&snapshot, "title:library", 10).is_empty());
    assert!(search(&snapshot, "-library", 10).is_empty(), "purely negative queries match nothing");

    let boosted = search(&snapshot, "lucinity algorithm^10", 10);
    assert_eq!(boosted, vec![2, 1]);
    let plain = search(&snapshot, "lucinity algorithm", 10);
    assert_eq!(plain.len(), 2);
}

#[test]
fn match_all_scores_every_document_equally() {
    let store = IndexStore::temporary().unwrap();
    fill(&store);
    let hits = store.snapshot().search(&Query::MatchAll, 10);
    assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert!(hits.iter().all(|h| h.score == 1.0));
}

#[test]
fn search_limit_zero_and_empty_store() {
    let store = IndexStore::temporary().unwrap();
    assert!(store.snapshot().search(&Query::MatchAll, 10).is_empty());
    fill(&store);
    assert!(store.snapshot().search(&Query::MatchAll, 0).is_empty());
}

#[test]
fn temporary_store_removes_its_directory() {
    let store = IndexStore::temporary().unwrap();
    let dir = store.dir().to_path_buf();
    fill(&store);
    assert!(dir.join(LOG_FILE_NAME).exists());
    drop(store);
    assert!(!dir.exists());
}
