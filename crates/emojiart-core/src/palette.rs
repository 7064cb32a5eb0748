//! Emoji palettes offered to the user for dropping onto the canvas.

use serde::{Deserialize, Serialize};

use crate::storage::{Storage, StorageError, StorageResult};

/// Storage key the palette set is saved under.
pub const PALETTES_KEY: &str = "__palettes__";

/// A named, ordered set of emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub name: String,
    pub emojis: Vec<String>,
}

impl Palette {
    pub fn new(name: impl Into<String>, emojis: &[&str]) -> Self {
        Self {
            name: name.into(),
            emojis: emojis.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// The ordered palette set. Palettes are addressed by index; the set is
/// never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteStore {
    palettes: Vec<Palette>,
}

impl Default for PaletteStore {
    fn default() -> Self {
        Self {
            palettes: vec![
                Palette::new("Faces", &["😁", "🙃", "😏", "😭", "😢", "😳", "😩", "😎", "😟"]),
                Palette::new("Food", &["🍏", "🍎", "🥒", "🍞", "🥨", "🥓", "🍔", "🍟", "🍕", "🍰"]),
                Palette::new("Animals", &["🐶", "🐼", "🐵", "🙈", "🦆", "🐝", "🐟", "🦓", "🐪"]),
                Palette::new("Activities", &["⚽", "🏈", "⚾", "🎾", "🏐", "🏓", "⛳", "🎳", "🎭"]),
            ],
        }
    }
}

impl PaletteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the palette set from `storage`, falling back to the built-in set.
    pub fn load(storage: &dyn Storage) -> Self {
        let bytes = match storage.get(PALETTES_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::warn!("Could not read palettes: {}", e);
                return Self::default();
            }
        };
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(store) if !store.palettes.is_empty() => store,
            Ok(_) => Self::default(),
            Err(e) => {
                log::warn!("Malformed palettes, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &dyn Storage) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| StorageError::Serialization(e.to_string()))?;
        storage.set(PALETTES_KEY, &bytes)
    }

    pub fn len(&self) -> usize {
        self.palettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palettes.is_empty()
    }

    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    /// Index of the palette shown by default.
    pub fn default_palette(&self) -> usize {
        0
    }

    pub fn palette(&self, index: usize) -> Option<&Palette> {
        self.palettes.get(index)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.palette(index).map(|p| p.name.as_str())
    }

    /// The next palette, wrapping to the first. Unknown indices yield the first.
    pub fn palette_after(&self, index: usize) -> usize {
        if index >= self.palettes.len() {
            return 0;
        }
        (index + 1) % self.palettes.len()
    }

    /// The previous palette, wrapping to the last. Unknown indices yield the first.
    pub fn palette_before(&self, index: usize) -> usize {
        if index >= self.palettes.len() {
            return 0;
        }
        (index + self.palettes.len() - 1) % self.palettes.len()
    }

    /// Put `emoji` at the front of a palette, dropping any earlier copy.
    /// Returns false for an unknown palette or empty emoji.
    pub fn add_emoji(&mut self, emoji: &str, index: usize) -> bool {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return false;
        }
        let Some(palette) = self.palettes.get_mut(index) else {
            return false;
        };
        palette.emojis.retain(|e| e != emoji);
        palette.emojis.insert(0, emoji.to_string());
        true
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.palettes.get_mut(index) {
            Some(palette) => {
                palette.name = name.into();
                true
            }
            None => false,
        }
    }
}
