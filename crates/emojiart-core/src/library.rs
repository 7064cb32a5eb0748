//! Named collection of documents sharing one store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::background::ByteFetcher;
use crate::document::EmojiArtDocument;
use crate::storage::{Storage, StorageError};

/// Storage key the name index is saved under.
pub const INDEX_KEY: &str = "__library_index__";

const DEFAULT_NAME: &str = "Untitled";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed library index: {0}")]
    Index(#[from] serde_json::Error),
    #[error("no document {0}")]
    UnknownDocument(Uuid),
    #[error("a document named {0:?} already exists")]
    NameTaken(String),
    #[error("document names cannot be empty")]
    EmptyName,
}

/// A document's identifier and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: Uuid,
    pub name: String,
}

/// The set of documents in a store and their display names.
///
/// Names are unique. The index is written back after every change.
pub struct DocumentLibrary {
    storage: Arc<dyn Storage>,
    entries: Vec<LibraryEntry>,
}

impl DocumentLibrary {
    /// Read the library index from `storage`. A store without an index is an
    /// empty library.
    pub fn load(storage: Arc<dyn Storage>) -> Result<Self, LibraryError> {
        let entries = match storage.get(INDEX_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(Self { storage, entries })
    }

    /// Documents in the order they were added.
    pub fn documents(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn name(&self, id: Uuid) -> Option<&str> {
        self.entry(id).map(|e| e.name.as_str())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entry(id).is_some()
    }

    /// Add an empty document named "Untitled", numbered if that name is taken.
    pub fn add_document(&mut self) -> Result<Uuid, LibraryError> {
        self.add_named(DEFAULT_NAME)
    }

    /// Add an empty document, numbering `name` if it is already taken.
    pub fn add_named(&mut self, name: &str) -> Result<Uuid, LibraryError> {
        let name = name.trim();
        let name = self.unique_name(if name.is_empty() { DEFAULT_NAME } else { name });
        let id = Uuid::new_v4();
        log::debug!("Adding document {} as {:?}", id, name);
        let mut entries = self.entries.clone();
        entries.push(LibraryEntry { id, name });
        self.commit(entries)?;
        Ok(id)
    }

    /// Remove a document and its stored content. Returns false if it was
    /// not in the library.
    pub fn remove_document(&mut self, id: Uuid) -> Result<bool, LibraryError> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let mut entries = self.entries.clone();
        entries.remove(index);
        self.commit(entries)?;
        self.storage.delete(&id.to_string())?;
        Ok(true)
    }

    /// Rename a document. Names already used by another document are refused.
    pub fn set_name(&mut self, id: Uuid, name: &str) -> Result<(), LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if self.entries.iter().any(|e| e.name == name && e.id != id) {
            return Err(LibraryError::NameTaken(name.to_string()));
        }
        let mut entries = self.entries.clone();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LibraryError::UnknownDocument(id))?;
        entry.name = name.to_string();
        self.commit(entries)
    }

    /// Open a document from the library for editing.
    pub fn open(
        &self,
        id: Uuid,
        fetcher: Arc<dyn ByteFetcher>,
    ) -> Result<EmojiArtDocument, LibraryError> {
        if !self.contains(id) {
            return Err(LibraryError::UnknownDocument(id));
        }
        Ok(EmojiArtDocument::with_id(id, self.storage.clone(), fetcher))
    }

    fn entry(&self, id: Uuid) -> Option<&LibraryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |name: &str| self.entries.iter().any(|e| e.name == name);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{} {}", base, n))
            .find(|candidate| !taken(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Persist `entries` as the new index, then adopt them. The in-memory
    /// index is untouched when the write fails.
    fn commit(&mut self, entries: Vec<LibraryEntry>) -> Result<(), LibraryError> {
        let bytes = serde_json::to_vec(&entries)?;
        self.storage.set(INDEX_KEY, &bytes)?;
        self.entries = entries;
        Ok(())
    }
}
