//! Append-only event journal with checksums
//!
//! Every committed store transaction appends its events here; startup
//! recovery replays the journal to rebuild the tables.
//!
//! # Frame format
//!
//! Each record is a bincode-encoded `JournalEntry` behind a fixed 8-byte
//! frame header:
//!
//! ```text
//! [record_len: u32 LE][checksum: u32 LE][record: bincode(JournalEntry)]
//! ```
//!
//! The checksum is CRC32C over the encoded record. A frame that runs past
//! the end of the file is a torn final write and ends replay; a checksum or
//! decode failure inside the file is corruption and aborts it.

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Frame header: record length + checksum
const FRAME_HEADER_LEN: usize = 8;

/// Records larger than this are treated as corruption, not data
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Corrupt record at offset {offset}: {message}")]
    Corrupt { offset: u64, message: String },

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },
}

/// One persisted event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Global monotonic sequence number
    pub sequence: u64,
    /// Unix nanosecond timestamp
    pub timestamp: i64,
    /// Bincode-serialized store event
    pub payload: Vec<u8>,
}

impl JournalEntry {
    pub fn new(sequence: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp,
            payload,
        }
    }

    /// Encode as a framed record
    pub fn to_frame(&self) -> Result<Vec<u8>, JournalError> {
        let record = bincode::serialize(self).map_err(|e| JournalError::Encode(e.to_string()))?;
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + record.len());
        frame.extend_from_slice(&(record.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32c(&record).to_le_bytes());
        frame.extend_from_slice(&record);
        Ok(frame)
    }

    /// Decode one framed record from the front of `data`.
    ///
    /// Returns `Ok(None)` when the remaining bytes cannot hold a complete
    /// frame (a torn final write); returns an error for in-file corruption.
    /// `offset` is only used for diagnostics.
    pub fn from_frame(data: &[u8], offset: u64) -> Result<Option<(Self, usize)>, JournalError> {
        if data.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let record_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if record_len > MAX_RECORD_LEN {
            return Err(JournalError::Corrupt {
                offset,
                message: format!("implausible record length {}", record_len),
            });
        }

        let total = FRAME_HEADER_LEN + record_len;
        if data.len() < total {
            return Ok(None);
        }

        let stored_crc = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let record = &data[FRAME_HEADER_LEN..total];
        if crc32c(record) != stored_crc {
            return Err(JournalError::Corrupt {
                offset,
                message: "checksum mismatch".into(),
            });
        }

        let entry: JournalEntry = bincode::deserialize(record).map_err(|e| {
            JournalError::Corrupt {
                offset,
                message: format!("undecodable record: {}", e),
            }
        })?;

        Ok(Some((entry, total)))
    }
}

/// Append-only journal writer; callers fsync once per commit batch.
pub struct JournalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    next_sequence: u64,
}

impl JournalWriter {
    /// Open the journal for appending, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, JournalError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = Self::journal_path(dir);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            next_sequence: 0,
        })
    }

    /// Set the next expected sequence number (used after recovery).
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a journal entry. Validates sequence monotonicity.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if self.next_sequence > 0 && entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }

        self.writer.write_all(&entry.to_frame()?)?;
        self.next_sequence = entry.sequence + 1;
        Ok(())
    }

    /// Flush + fsync. Called once per committed transaction.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn journal_path(dir: &Path) -> PathBuf {
        dir.join("journal.bin")
    }
}

/// Sequential journal reader used by startup recovery.
pub struct JournalReader {
    data: Vec<u8>,
    pos: usize,
}

impl JournalReader {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = JournalWriter::journal_path(dir.as_ref());
        let mut data = Vec::new();
        if path.exists() {
            File::open(&path)?.read_to_end(&mut data)?;
        }
        Ok(Self { data, pos: 0 })
    }

    /// Read the next entry, or None at end of journal (including a torn
    /// final write).
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, JournalError> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        match JournalEntry::from_frame(&self.data[self.pos..], self.pos as u64)? {
            Some((entry, consumed)) => {
                self.pos += consumed;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }
}
