//! Whole-document JSON persistence.
//!
//! A document is read once when a component opens and rewritten in full after
//! every mutation. Writes go to a temporary file in the same directory which
//! is then renamed over the target, so readers see either the old or the new
//! document, never a torn one.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError};

/// Persistence primitive for named JSON documents.
pub trait DocumentStore: Send + Sync {
    /// Load a document.
    ///
    /// A missing or unreadable document is reported as `None`; callers start
    /// from their empty state.
    fn load(&self, name: &str) -> Option<Value>;

    /// Replace a document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the document could not be written.
    fn save(&self, name: &str, document: &Value) -> Result<()>;
}

/// Load and decode a document, treating undecodable content as absent.
pub fn load_document<T: DeserializeOwned>(store: &dyn DocumentStore, name: &str) -> Option<T> {
    let value = store.load(name)?;
    match serde_json::from_value(value) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(document = name, error = %e, "Document has unexpected shape, starting empty");
            None
        }
    }
}

/// Encode and save a document.
///
/// Failures are logged and reported as `false`; the caller's in-memory state
/// stays authoritative until the next successful write.
pub fn save_document<T: Serialize>(store: &dyn DocumentStore, name: &str, document: &T) -> bool {
    let result = serde_json::to_value(document)
        .map_err(|e| StoreError::Serialization(e.to_string()))
        .and_then(|value| store.save(name, &value));

    match result {
        Ok(()) => true,
        Err(e) => {
            error!(document = name, error = %e, "Failed to persist document");
            false
        }
    }
}

// ============================================================================
// File store
// ============================================================================

/// Documents as `<name>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened document store");
        Ok(Self { dir })
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Keep a copy of an undecodable file so the next save does not erase it.
    fn quarantine(&self, name: &str, path: &Path) {
        let target = self.dir.join(format!("{name}.corrupt.json"));
        if let Err(e) = fs::copy(path, &target) {
            warn!(document = name, error = %e, "Failed to copy corrupt document aside");
        }
    }
}

impl DocumentStore for FileStore {
    fn load(&self, name: &str) -> Option<Value> {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(document = name, error = %e, "Failed to read document, starting empty");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(document = name, error = %e, "Corrupt document, starting empty");
                self.quarantine(name, &path);
                None
            }
        }
    }

    fn save(&self, name: &str, document: &Value) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(name)).map_err(|e| e.error)?;
        Ok(())
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// In-memory documents, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail, simulating a full disk.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Overwrite a document directly, bypassing any component.
    pub fn put(&self, name: &str, document: Value) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), document);
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, name: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn save(&self, name: &str, document: &Value) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(name.to_string()));
        }
        self.put(name, document.clone());
        Ok(())
    }
}
