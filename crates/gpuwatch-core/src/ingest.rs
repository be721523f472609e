//! Incremental log ingestion.
//!
//! An [`Ingestor`] remembers the byte offset of the last complete record it
//! decoded and, on each [`poll`](Ingestor::poll), parses only what was
//! appended since. A file that got shorter than that offset was truncated or
//! rotated; the next poll re-reads it from the start and reports a
//! [`Update::Rebuild`] so the index is replaced instead of extended.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::parser::{LogSchema, parse_chunk};
use crate::sample::Sample;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("log source unavailable: {0}")]
    Unavailable(#[from] io::Error),
}

/// Byte-addressable, append-only log storage.
pub trait LogSource {
    /// Current length in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Everything from `offset` to the current end.
    fn read_from(&self, offset: u64) -> io::Result<Vec<u8>>;
}

/// A log file on disk. The path is re-opened on every call so rotation is
/// observed.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSource for FileSource {
    fn size(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn read_from(&self, offset: u64) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Shared in-memory log. Clones see the same bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySource {
    pub fn new(initial: &str) -> Self {
        let source = Self::default();
        source.append(initial);
        source
    }

    pub fn append(&self, text: &str) {
        self.lock().extend_from_slice(text.as_bytes());
    }

    /// Replace the whole content, as a log rotation would.
    pub fn replace(&self, text: &str) {
        let mut bytes = self.lock();
        bytes.clear();
        bytes.extend_from_slice(text.as_bytes());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogSource for MemorySource {
    fn size(&self) -> io::Result<u64> {
        Ok(self.lock().len() as u64)
    }

    fn read_from(&self, offset: u64) -> io::Result<Vec<u8>> {
        let bytes = self.lock();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        Ok(bytes[start..].to_vec())
    }
}

/// What the index should do with a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Extend the index. Empty when nothing new arrived.
    Append(Vec<Sample>),
    /// The log shrank: replace the index with this batch.
    Rebuild(Vec<Sample>),
}

/// Running ingestion counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub parsed: usize,
    /// Malformed records dropped by the parser.
    pub skipped: usize,
    /// Out-of-order samples the index refused.
    pub rejected: usize,
    pub rebuilds: usize,
    pub last_error: Option<String>,
}

impl IngestStats {
    /// Records that never made it into the index.
    pub fn dropped(&self) -> usize {
        self.skipped + self.rejected
    }
}

/// Offset-tracking reader over a [`LogSource`].
#[derive(Debug)]
pub struct Ingestor<S> {
    source: S,
    offset: u64,
    schema: Option<LogSchema>,
    stats: IngestStats,
}

impl<S: LogSource> Ingestor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            offset: 0,
            schema: None,
            stats: IngestStats::default(),
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Add index rejections to the counters.
    pub fn record_rejected(&mut self, rejected: usize) {
        self.stats.rejected += rejected;
    }

    /// Read the whole log from the start.
    ///
    /// `complete` also decodes a trailing line without a newline; pass it
    /// only when nothing is writing to the log any more.
    pub fn load_all(&mut self, complete: bool) -> Result<Vec<Sample>, IngestError> {
        self.offset = 0;
        self.schema = None;
        self.read(complete)
    }

    /// Pick up whatever was written since the last call.
    pub fn poll(&mut self) -> Result<Update, IngestError> {
        let size = self.source.size()?;
        if size < self.offset {
            log::warn!(
                "log shrank from {} to {size} bytes, rebuilding index",
                self.offset
            );
            self.stats.rebuilds += 1;
            return self.load_all(false).map(Update::Rebuild);
        }
        if size == self.offset {
            return Ok(Update::Append(Vec::new()));
        }
        self.read(false).map(Update::Append)
    }

    fn read(&mut self, include_partial: bool) -> Result<Vec<Sample>, IngestError> {
        let bytes = self.source.read_from(self.offset)?;
        let chunk = parse_chunk(&bytes, self.schema, include_partial);

        self.offset += chunk.consumed as u64;
        self.schema = chunk.schema;
        self.stats.parsed += chunk.samples.len();
        self.stats.skipped += chunk.skipped;
        if let Some(e) = chunk.last_error {
            log::debug!("skipped {} malformed record(s), last: {e}", chunk.skipped);
            self.stats.last_error = Some(e.to_string());
        }
        log::debug!(
            "ingested {} sample(s), offset now {}",
            chunk.samples.len(),
            self.offset
        );
        Ok(chunk.samples)
    }
}
