//! Append-only document log.
//!
//! Every accepted document is written here before it becomes visible to
//! searches. On open the log is replayed to rebuild the in-memory segments.
//!
//! ## File format
//!
//! `[u32 LE: payload length][u32 LE: crc32 of payload][json: StoredDocument]`
//! repeated per document. Each append is followed by `sync_data`.
//!
//! A record that was only partially written (length, checksum or payload cut
//! short, or a checksum mismatch) can only be the last one, and is truncated
//! away on replay. A checksum mismatch with more bytes after the frame is
//! damage to committed data and fails the open without touching the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use lexdb_core::error::{IndexError, Result};
use lexdb_core::DocId;

use crate::segment::StoredDocument;

pub const LOG_FILE_NAME: &str = "documents.log";

const HEADER_LEN: u64 = 8;

#[derive(Debug)]
pub struct DocumentLog {
	path: PathBuf,
	file: File,
	committed_len: u64,
}

impl DocumentLog {
	/// Opens (or creates) the log in `dir` and returns every committed record
	/// in append order.
	pub fn open(dir: &Path) -> Result<(Self, Vec<StoredDocument>)> {
		let path = dir.join(LOG_FILE_NAME);
		let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
		let (records, committed_len) = replay(&mut file, &path)?;

		let size = file.metadata()?.len();
		if size > committed_len {
			tracing::warn!(
				path = %path.display(),
				discarded_bytes = size - committed_len,
				"truncating incomplete record at end of document log"
			);
			file.set_len(committed_len)?;
			file.sync_data()?;
		}

		tracing::debug!(path = %path.display(), records = records.len(), "document log replayed");
		Ok((Self { path, file, committed_len }, records))
	}

	pub fn path(&self) -> &Path { &self.path }

	pub fn len_bytes(&self) -> u64 { self.committed_len }

	/// Durably appends one record. On failure the file is cut back to the last
	/// committed record so a later append does not land after garbage.
	pub fn append(&mut self, record: &StoredDocument) -> Result<()> {
		let payload = serde_json::to_vec(record)?;
		let len = u32::try_from(payload.len())
			.map_err(|_| IndexError::InvalidDocument(format!("record of {} bytes is too large", payload.len())))?;
		let crc = crc32fast::hash(&payload);

		let mut frame = Vec::with_capacity(HEADER_LEN as usize + payload.len());
		frame.extend_from_slice(&len.to_le_bytes());
		frame.extend_from_slice(&crc.to_le_bytes());
		frame.extend_from_slice(&payload);

		match self.write_frame(&frame) {
			Ok(()) => {
				self.committed_len += frame.len() as u64;
				Ok(())
			}
			Err(e) => {
				if let Err(rollback) = self.file.set_len(self.committed_len) {
					tracing::error!(path = %self.path.display(), error = %rollback, "failed to roll back document log");
				}
				Err(e.into())
			}
		}
	}

	#[cfg(test)]
	pub(crate) fn replace_file(&mut self, file: File) { self.file = file; }

	fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
		self.file.seek(SeekFrom::Start(self.committed_len))?;
		self.file.write_all(frame)?;
		self.file.sync_data()
	}
}

fn replay(file: &mut File, path: &Path) -> Result<(Vec<StoredDocument>, u64)> {
	let mut bytes = Vec::new();
	file.seek(SeekFrom::Start(0))?;
	file.read_to_end(&mut bytes)?;

	let mut records = Vec::new();
	let mut position = 0usize;
	let mut last_id: Option<DocId> = None;

	while position + HEADER_LEN as usize <= bytes.len() {
		let len = read_u32(&bytes, position) as usize;
		let crc = read_u32(&bytes, position + 4);
		let start = position + HEADER_LEN as usize;
		let Some(end) = start.checked_add(len).filter(|end| *end <= bytes.len()) else { break };

		let payload = &bytes[start..end];
		if crc32fast::hash(payload) != crc {
			if end < bytes.len() {
				return Err(corrupt(path, position, "checksum mismatch before end of log"));
			}
			break;
		}

		let record: StoredDocument = serde_json::from_slice(payload).map_err(|e| corrupt(path, position, e))?;
		if last_id.is_some_and(|last| record.doc_id <= last) {
			return Err(corrupt(path, position, format!("doc id {} is not increasing", record.doc_id)));
		}
		last_id = Some(record.doc_id);
		records.push(record);
		position = end;
	}

	Ok((records, position as u64))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
	let mut buf = [0u8; 4];
	buf.copy_from_slice(&bytes[at..at + 4]);
	u32::from_le_bytes(buf)
}

fn corrupt(path: &Path, offset: usize, reason: impl std::fmt::Display) -> IndexError {
	IndexError::Corrupt { path: path.display().to_string(), reason: format!("record at byte {offset}: {reason}") }
}
