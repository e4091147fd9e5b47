//! The index store: durable document log plus an in-memory generation of
//! immutable segments.
//!
//! Readers take a [`Snapshot`], which pins the generation current at that
//! moment. `add` builds a one-document segment under the writer lock and swaps
//! in a new generation; snapshots already handed out are never touched.

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use lexdb_core::config::Settings;
use lexdb_core::error::{IndexError, Result};
use lexdb_core::{DocId, Document, Metadata, TokenCounter, CONTENT_FIELD, TOKEN_COUNT_FIELD};
use lexdb_tokens::{get_default_counter, WordRatioCounter};

use crate::analysis::Analyzer;
use crate::log::DocumentLog;
use crate::segment::{Posting, Segment, SegmentBuilder};

pub use crate::segment::StoredDocument;

pub const DEFAULT_MERGE_THRESHOLD: usize = 16;

/// Held exclusively by the one store that has the directory open.
pub const LOCK_FILE_NAME: &str = "write.lock";

#[derive(Clone)]
pub struct StoreOptions {
	/// Segment count above which the writer merges a trailing run of segments.
	pub merge_threshold: usize,
	pub token_counter: Arc<dyn TokenCounter>,
}

impl StoreOptions {
	pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
		Ok(Self {
			merge_threshold: settings.store.merge_threshold,
			token_counter: get_default_counter(&settings.tokens)?,
		})
	}

	pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
		self.token_counter = counter;
		self
	}

	pub fn with_merge_threshold(mut self, threshold: usize) -> Self {
		self.merge_threshold = threshold.max(2);
		self
	}
}

impl Default for StoreOptions {
	fn default() -> Self {
		Self { merge_threshold: DEFAULT_MERGE_THRESHOLD, token_counter: Arc::new(WordRatioCounter::default()) }
	}
}

impl fmt::Debug for StoreOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StoreOptions")
			.field("merge_threshold", &self.merge_threshold)
			.field("token_counter", &self.token_counter.name())
			.finish()
	}
}

#[derive(Debug, Default)]
pub(crate) struct Generation {
	pub(crate) segments: Vec<Arc<Segment>>,
	num_docs: u64,
	total_field_len: u64,
	version: u64,
}

impl Generation {
	fn from_segments(segments: Vec<Arc<Segment>>, version: u64) -> Self {
		let num_docs = segments.iter().map(|s| s.num_docs() as u64).sum();
		let total_field_len = segments.iter().map(|s| s.total_field_len()).sum();
		Self { segments, num_docs, total_field_len, version }
	}

	/// Appends `segment`, then merges the trailing run while there are more
	/// than `merge_threshold` segments.
	fn with_segment(&self, segment: Segment, merge_threshold: usize) -> Self {
		let mut segments = self.segments.clone();
		segments.push(Arc::new(segment));
		while segments.len() > merge_threshold {
			let start = merge_start(&segments);
			let merged = Segment::merge(&segments[start..]);
			tracing::debug!(merged_segments = segments.len() - start, docs = merged.num_docs(), "merged segments");
			segments.truncate(start);
			segments.push(Arc::new(merged));
		}
		Self::from_segments(segments, self.version + 1)
	}
}

/// Start of the trailing run to merge: at least the last two segments, extended
/// backwards while the preceding segment holds no more docs than the run.
fn merge_start(segments: &[Arc<Segment>]) -> usize {
	let mut start = segments.len().saturating_sub(2);
	let mut run_docs: usize = segments[start..].iter().map(|s| s.num_docs()).sum();
	while start > 0 && segments[start - 1].num_docs() <= run_docs {
		start -= 1;
		run_docs += segments[start].num_docs();
	}
	start
}

struct Writer {
	log: DocumentLog,
	next_doc_id: DocId,
}

pub struct IndexStore {
	dir: PathBuf,
	analyzer: Analyzer,
	options: StoreOptions,
	writer: Mutex<Writer>,
	current: RwLock<Arc<Generation>>,
	_lock: File,
	// dropped last so the directory outlives the open log file
	_temp_dir: Option<TempDir>,
}

impl IndexStore {
	pub fn open(dir: impl AsRef<Path>) -> Result<Self> { Self::open_with(dir, StoreOptions::default()) }

	pub fn open_with(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
		Self::open_inner(dir.as_ref().to_path_buf(), options, None)
	}

	/// A store in a fresh temporary directory, deleted when the store is dropped.
	pub fn temporary() -> Result<Self> { Self::temporary_with(StoreOptions::default()) }

	pub fn temporary_with(options: StoreOptions) -> Result<Self> {
		let temp_dir = TempDir::new()?;
		Self::open_inner(temp_dir.path().to_path_buf(), options, Some(temp_dir))
	}

	fn open_inner(dir: PathBuf, options: StoreOptions, temp_dir: Option<TempDir>) -> Result<Self> {
		fs::create_dir_all(&dir)?;
		let lock = acquire_lock(&dir)?;
		let analyzer = Analyzer::standard();
		let (log, records) = DocumentLog::open(&dir)?;

		let next_doc_id = records.last().map_or(0, |r| r.doc_id + 1);
		let mut builder = SegmentBuilder::new();
		for record in records {
			let tokens = analyzer.analyze(&record.content);
			builder.add(record, &tokens);
		}
		let segments = if builder.is_empty() { Vec::new() } else { vec![Arc::new(builder.build())] };
		let generation = Generation::from_segments(segments, 0);

		tracing::info!(
			dir = %dir.display(),
			docs = generation.num_docs,
			next_doc_id,
			token_counter = options.token_counter.name(),
			"opened index store"
		);

		Ok(Self {
			dir,
			analyzer,
			options,
			writer: Mutex::new(Writer { log, next_doc_id }),
			current: RwLock::new(Arc::new(generation)),
			_lock: lock,
			_temp_dir: temp_dir,
		})
	}

	pub fn dir(&self) -> &Path { &self.dir }

	pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

	pub fn options(&self) -> &StoreOptions { &self.options }

	/// Durably stores `document` and makes it visible to snapshots taken after
	/// this call returns.
	pub fn add(&self, document: Document) -> Result<DocId> {
		validate_metadata(&document.metadata)?;
		let token_count = self.count_tokens(&document.content)?;
		let tokens = self.analyzer.analyze(&document.content);

		let mut writer = self.writer.lock();
		let doc_id = writer.next_doc_id;
		let stored = StoredDocument { doc_id, content: document.content, token_count, metadata: document.metadata };
		writer.log.append(&stored)?;
		writer.next_doc_id += 1;

		let mut builder = SegmentBuilder::new();
		builder.add(stored, &tokens);
		let next = self.current.read().with_segment(builder.build(), self.options.merge_threshold);
		*self.current.write() = Arc::new(next);
		drop(writer);

		tracing::debug!(doc_id, token_count, "document added");
		Ok(doc_id)
	}

	pub fn add_content(&self, text: impl Into<String>, metadata: Metadata) -> Result<DocId> {
		self.add(Document::new(text).with_metadata_map(metadata))
	}

	pub fn snapshot(&self) -> Snapshot { Snapshot { generation: self.current.read().clone() } }

	fn count_tokens(&self, content: &str) -> Result<i32> {
		let count = self.options.token_counter.count_tokens(content).map_err(|e| IndexError::TokenCount(e.to_string()))?;
		i32::try_from(count).map_err(|_| IndexError::TokenCount(format!("token count {count} does not fit in i32")))
	}
}

impl fmt::Debug for IndexStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IndexStore").field("dir", &self.dir).field("options", &self.options).finish_non_exhaustive()
	}
}

/// The lock is released when the returned file is closed.
fn acquire_lock(dir: &Path) -> Result<File> {
	let lock = OpenOptions::new().create(true).truncate(false).read(true).write(true).open(dir.join(LOCK_FILE_NAME))?;
	FileExt::try_lock_exclusive(&lock).map_err(|_| IndexError::Locked(dir.display().to_string()))?;
	Ok(lock)
}

fn validate_metadata(metadata: &Metadata) -> Result<()> {
	for (name, value) in metadata {
		if name == CONTENT_FIELD || name == TOKEN_COUNT_FIELD {
			return Err(IndexError::ReservedField(name.clone()));
		}
		if !value.is_finite() {
			return Err(IndexError::InvalidDocument(format!("metadata '{name}' is not a finite number")));
		}
	}
	Ok(())
}

/// Immutable point-in-time view of the store.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub(crate) generation: Arc<Generation>,
}

impl Snapshot {
	/// Increases by one for every published generation of the same store.
	pub fn version(&self) -> u64 { self.generation.version }

	pub fn num_docs(&self) -> u64 { self.generation.num_docs }

	pub fn num_segments(&self) -> usize { self.generation.segments.len() }

	pub fn total_field_len(&self) -> u64 { self.generation.total_field_len }

	pub fn avg_field_len(&self) -> f32 {
		if self.generation.num_docs == 0 {
			0.0
		} else {
			self.generation.total_field_len as f32 / self.generation.num_docs as f32
		}
	}

	pub fn doc_freq(&self, term: &str) -> u64 { self.generation.segments.iter().map(|s| s.doc_freq(term)).sum() }

	/// Postings of `term` across all segments, in ascending doc id order.
	pub fn postings<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a Posting> + 'a {
		self.generation.segments.iter().flat_map(move |s| s.postings(term).iter())
	}

	pub fn document(&self, doc_id: DocId) -> Option<&StoredDocument> {
		self.segment_for(doc_id).and_then(|s| s.document(doc_id))
	}

	pub fn field_len(&self, doc_id: DocId) -> Option<u32> { self.segment_for(doc_id).and_then(|s| s.field_len(doc_id)) }

	pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ { self.generation.segments.iter().flat_map(|s| s.doc_ids()) }

	fn segment_for(&self, doc_id: DocId) -> Option<&Segment> {
		let segments = &self.generation.segments;
		let idx = segments.partition_point(|s| s.first_doc_id().map_or(true, |first| first <= doc_id));
		idx.checked_sub(1).map(|i| segments[i].as_ref())
	}
}
