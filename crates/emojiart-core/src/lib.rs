//! EmojiArt Core Library
//!
//! Document state and editing intents for the EmojiArt canvas: the glyph model,
//! its persisted form, background image fetching, the document controller and
//! the gesture composer that turns resolved pointer deltas into intents.

pub mod background;
pub mod codec;
pub mod config;
pub mod document;
pub mod geometry;
pub mod gesture;
pub mod library;
pub mod model;
pub mod palette;
pub mod storage;

pub use background::{BackgroundImage, ByteFetcher, FetchError, FetchState, UrlFetcher};
pub use codec::DecodeError;
pub use config::{ConfigError, EditorConfig};
pub use document::{DocumentEvent, EmojiArtDocument};
pub use gesture::{Gesture, GestureComposer};
pub use library::{DocumentLibrary, LibraryEntry, LibraryError};
pub use model::{EmojiArt, Glyph, GlyphId};
pub use palette::{Palette, PaletteStore};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
