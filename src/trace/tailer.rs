//! Incremental record cache over one growing trace log
//!
//! The tailer consumes the source file byte-incrementally: it remembers how
//! far it has read, holds back an unterminated trailing line until the
//! writer finishes it, and detects rotation/truncation through the file's
//! identity and size. Accumulated records are kept behind an `Arc` so every
//! caller gets an immutable snapshot that later refreshes cannot disturb.

use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::model::LogRecord;
use super::parser::parse_line;

/// Stable identity of the underlying file, used to detect rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    // Without a stable inode equivalent, rotation is only detectable as a
    // size decrease.
    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}

#[derive(Default)]
struct TailState {
    offset: u64,
    remainder: Vec<u8>,
    identity: Option<FileIdentity>,
    records: Arc<Vec<LogRecord>>,
}

impl TailState {
    fn reset(&mut self) {
        self.offset = 0;
        self.remainder.clear();
        self.identity = None;
        self.records = Arc::new(Vec::new());
    }
}

/// Append-only record cache for one source path.
///
/// All tail state lives under a single mutex so a refresh and a snapshot
/// read form one critical section; the lock is never held across await
/// points (the tailer is fully synchronous).
pub struct LogTailer {
    path: PathBuf,
    state: Mutex<TailState>,
}

impl LogTailer {
    /// Create a tailer for `path`. The path is absolutized once so relative
    /// paths keep working if the process changes directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = std::path::absolute(&path).unwrap_or(path);
        Self {
            path,
            state: Mutex::new(TailState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume any new bytes from the source file and return the full
    /// accumulated record sequence.
    ///
    /// With no file growth this is a no-op returning the same snapshot;
    /// after growth it strictly extends the sequence without re-parsing
    /// previously consumed bytes. A missing file empties the cache; an
    /// identity change or size decrease resets it (the file is a new
    /// logical stream); transient I/O errors degrade to the last known
    /// snapshot.
    pub fn refresh(&self) -> Arc<Vec<LogRecord>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                state.reset();
                return state.records.clone();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "stat failed, serving cached records");
                return state.records.clone();
            }
        };

        let identity = FileIdentity::of(&meta);
        if let Some(previous) = state.identity {
            if previous != identity || meta.len() < state.offset {
                debug!(path = %self.path.display(), "rotation or truncation detected, resetting cache");
                state.reset();
            }
        }
        state.identity = Some(identity);

        let buf = match self.read_from(state.offset) {
            Ok(buf) => buf,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "read failed, serving cached records");
                return state.records.clone();
            }
        };
        if buf.is_empty() {
            return state.records.clone();
        }
        state.offset += buf.len() as u64;

        // Carve complete lines; an unterminated trailing fragment is held
        // back until the writer finishes it.
        let mut bytes = std::mem::take(&mut state.remainder);
        bytes.extend_from_slice(&buf);
        let cut = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => {
                state.remainder = bytes;
                return state.records.clone();
            }
        };
        state.remainder = bytes.split_off(cut);

        // Copy-on-write: clones the backing vec only when a previously
        // handed-out snapshot is still alive.
        let records = Arc::make_mut(&mut state.records);
        for line in bytes.split(|&b| b == b'\n') {
            if let Some(record) = parse_line(&String::from_utf8_lossy(line)) {
                records.push(record);
            }
        }

        state.records.clone()
    }

    fn read_from(&self, offset: u64) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
