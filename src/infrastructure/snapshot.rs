//! JSON file snapshot of the data namespace.
//!
//! ## Format
//!
//! The snapshot is a single JSON object mapping keys to values at the top
//! level:
//!
//! ```text
//! {
//!   "a": 1,
//!   "profile": { "name": "ada" }
//! }
//! ```
//!
//! ## Failure handling
//!
//! - A missing file reads as an empty document.
//! - An unreadable file (permissions, I/O error) reads as an empty document.
//! - A file that is not a JSON object reads as an empty document.
//!
//! Each case is logged separately so they can be told apart. Only the write
//! side can fail, and then only the flush that hit the failure.
//!
//! ## Concurrency
//!
//! A flush re-reads the whole document, sets one key and writes the whole
//! document back through a temporary file and a rename. Flushes from the same
//! process are serialized; flushes from different processes are not, and the
//! last writer wins.

use crate::application::ports::{Document, PersistenceError, SnapshotStore};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Default snapshot file name.
pub const DEFAULT_SNAPSHOT_PATH: &str = "dump.json";

/// Outcome of reading the snapshot file.
#[derive(Debug)]
pub enum SnapshotRead {
    /// The file held a JSON object
    Loaded(Document),
    /// The file does not exist
    Missing,
    /// The file exists but could not be read
    Unreadable(io::Error),
    /// The file was read but is not a JSON object
    Malformed(serde_json::Error),
}

impl SnapshotRead {
    /// The document, with every failure kind degraded to empty.
    pub fn into_document(self) -> Document {
        match self {
            SnapshotRead::Loaded(document) => document,
            SnapshotRead::Missing | SnapshotRead::Unreadable(_) | SnapshotRead::Malformed(_) => {
                Document::new()
            }
        }
    }

    /// Check if the file held a usable document.
    pub fn is_loaded(&self) -> bool {
        matches!(self, SnapshotRead::Loaded(_))
    }
}

/// Snapshot stored as a JSON document on the local filesystem.
#[derive(Debug)]
pub struct JsonSnapshotFile {
    path: PathBuf,
    write_lock: Mutex<()>,
    temp_seq: AtomicU64,
}

impl JsonSnapshotFile {
    /// Create a snapshot backed by the file at `path`.
    ///
    /// The file is not touched until the first read or flush.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            temp_seq: AtomicU64::new(0),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the snapshot file, classifying any failure.
    pub fn read(&self) -> SnapshotRead {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "snapshot file missing");
                return SnapshotRead::Missing;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot file unreadable, treating as empty"
                );
                return SnapshotRead::Unreadable(e);
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return SnapshotRead::Loaded(Document::new());
        }

        match serde_json::from_slice::<Document>(&bytes) {
            Ok(document) => SnapshotRead::Loaded(document),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot file malformed, treating as empty"
                );
                SnapshotRead::Malformed(e)
            }
        }
    }

    /// Write the whole document through a temporary sibling file.
    fn write_document(&self, document: &Document) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_vec_pretty(document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string());
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            seq
        ))
    }
}

impl Default for JsonSnapshotFile {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_PATH)
    }
}

impl SnapshotStore for JsonSnapshotFile {
    fn flush(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut document = self.read().into_document();
        document.insert(key.to_string(), value.clone());

        match self.write_document(&document) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), key = %key, "flushed snapshot");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    key = %key,
                    error = %e,
                    "failed to flush snapshot"
                );
                Err(e)
            }
        }
    }

    fn fallback_get(&self, key: &str) -> Option<Value> {
        self.read().into_document().remove(key)
    }

    fn load_all(&self) -> Document {
        self.read().into_document()
    }
}
