use crate::config::StoreConfig;
use crate::database::StoreDocument;
use crate::error::{Result, StoreError};
use log::{info, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Abstraction over how the [`StoreDocument`] is persisted.
pub trait StorageEngine: Send + Sync {
    /// Load the document. Never fails: unreadable data yields an empty document.
    fn load(&self) -> StoreDocument;

    /// Persist the full document, replacing whatever was stored before.
    fn save(&self, doc: &StoreDocument) -> Result<()>;
}

/// JSON file based storage engine.
///
/// The whole document is rewritten on every save. With `atomic` set the
/// new contents go to a sibling temporary file which is then renamed over
/// the target, so a crash mid-write leaves the previous file intact.
pub struct JsonFileStorage {
    path: PathBuf,
    pretty: bool,
    atomic: bool,
}

impl JsonFileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        JsonFileStorage {
            path: path.into(),
            pretty: true,
            atomic: true,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        JsonFileStorage {
            path: config.path.clone(),
            pretty: config.pretty,
            atomic: config.atomic_writes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, doc: &StoreDocument) -> Result<String> {
        let data = if self.pretty {
            serde_json::to_string_pretty(doc)?
        } else {
            serde_json::to_string(doc)?
        };
        Ok(data)
    }

    fn write_atomic(&self, dir: &Path, data: &str) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(data.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;
        Ok(())
    }
}

impl StorageEngine for JsonFileStorage {
    fn load(&self) -> StoreDocument {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No store file at {}, starting empty", self.path.display());
                return StoreDocument::new();
            }
            Err(e) => {
                warn!(
                    "Failed to read store file {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                return StoreDocument::new();
            }
        };

        match serde_json::from_str::<StoreDocument>(&data) {
            Ok(doc) => {
                info!(
                    "Loaded {} record(s) from {} (next id {})",
                    doc.users.len(),
                    self.path.display(),
                    doc.next_id
                );
                doc
            }
            Err(e) => {
                warn!(
                    "Store file {} is corrupt ({}); starting empty",
                    self.path.display(),
                    e
                );
                StoreDocument::new()
            }
        }
    }

    fn save(&self, doc: &StoreDocument) -> Result<()> {
        let data = self.encode(doc)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        if self.atomic {
            self.write_atomic(dir, &data)?;
        } else {
            fs::write(&self.path, data).map_err(|e| StoreError::io(&self.path, e))?;
        }

        info!(
            "Saved {} record(s) to {}",
            doc.users.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-process storage engine. Keeps the last saved document in memory.
#[derive(Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<StoreDocument>>,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Start from an existing document, as if it had been saved before.
    pub fn with_document(doc: StoreDocument) -> Self {
        MemoryStorage {
            saved: Mutex::new(Some(doc)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<StoreDocument> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StorageEngine for MemoryStorage {
    fn load(&self) -> StoreDocument {
        self.snapshot().unwrap_or_default()
    }

    fn save(&self, doc: &StoreDocument) -> Result<()> {
        *self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(doc.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T: StorageEngine + ?Sized> StorageEngine for std::sync::Arc<T> {
    fn load(&self) -> StoreDocument {
        (**self).load()
    }

    fn save(&self, doc: &StoreDocument) -> Result<()> {
        (**self).save(doc)
    }
}
