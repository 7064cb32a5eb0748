//! Auto-save of the document after editing intents.
//!
//! Saves are fire-and-forget: failures are logged and the manager stays dirty
//! so the next intent (or an explicit flush) tries again.

use crate::codec;
use crate::model::EmojiArt;
use crate::storage::{Storage, StorageError, StorageResult};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a document is persisted.
#[derive(Clone)]
pub enum SaveTarget {
    /// A key in a key-value store (the controller's identifier).
    Keyed { storage: Arc<dyn Storage>, key: String },
    /// A file written directly.
    Path(PathBuf),
}

impl fmt::Debug for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveTarget::Keyed { key, .. } => f.debug_struct("Keyed").field("key", key).finish(),
            SaveTarget::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

impl fmt::Display for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveTarget::Keyed { key, .. } => write!(f, "key {}", key),
            SaveTarget::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl SaveTarget {
    /// Read the persisted bytes, if any.
    pub fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        match self {
            SaveTarget::Keyed { storage, key } => storage.get(key),
            SaveTarget::Path(path) => match fs::read(path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))),
            },
        }
    }

    /// Persist `bytes`, replacing the previous value.
    pub fn write(&self, bytes: &[u8]) -> StorageResult<()> {
        match self {
            SaveTarget::Keyed { storage, key } => storage.set(key, bytes),
            SaveTarget::Path(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Io(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
                fs::write(path, bytes).map_err(|e| {
                    StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
                })
            }
        }
    }
}

/// Manages automatic document persistence.
#[derive(Debug)]
pub struct AutoSaveManager {
    /// Where documents go.
    target: SaveTarget,
    /// Minimum time between two saves. Zero saves on every change.
    interval: Duration,
    /// Last save timestamp.
    last_save: Option<Instant>,
    /// Whether the document has unsaved changes.
    dirty: bool,
}

impl AutoSaveManager {
    /// Create a manager that saves immediately on every change.
    pub fn new(target: SaveTarget) -> Self {
        Self {
            target,
            interval: Duration::ZERO,
            last_save: None,
            dirty: false,
        }
    }

    /// Set the auto-save interval.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Get the auto-save interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn target(&self) -> &SaveTarget {
        &self.target
    }

    /// Mark the document as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the document has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check if enough time has passed for an auto-save.
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }

        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save the document if needed (dirty + interval elapsed).
    /// Returns true if a save was performed successfully.
    pub fn maybe_save(&mut self, document: &EmojiArt) -> bool {
        if !self.should_save() {
            return false;
        }
        self.save_logged(document)
    }

    /// Save pending changes regardless of the interval.
    pub fn flush(&mut self, document: &EmojiArt) -> bool {
        if !self.dirty {
            return false;
        }
        self.save_logged(document)
    }

    /// Force save the document immediately.
    pub fn save(&mut self, document: &EmojiArt) -> StorageResult<()> {
        let bytes =
            codec::encode(document).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.target.write(&bytes)?;

        self.last_save = Some(Instant::now());
        self.dirty = false;
        log::debug!("Saved document to {} ({} bytes)", self.target, bytes.len());
        Ok(())
    }

    fn save_logged(&mut self, document: &EmojiArt) -> bool {
        match self.save(document) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Autosave to {} failed: {}", self.target, e);
                false
            }
        }
    }

    /// Load the persisted document, falling back to an empty one when the
    /// stored bytes are missing, unreadable or malformed.
    pub fn load(&mut self) -> EmojiArt {
        let document = match self.target.read() {
            Ok(Some(bytes)) => codec::decode_or_default(&bytes),
            Ok(None) => EmojiArt::new(),
            Err(e) => {
                log::warn!("Could not read document from {}: {}", self.target, e);
                EmojiArt::new()
            }
        };
        self.dirty = false;
        document
    }
}
