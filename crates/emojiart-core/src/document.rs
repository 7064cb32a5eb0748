//! The document controller.
//!
//! [`EmojiArtDocument`] owns one [`EmojiArt`], the selection and the
//! background image slot. Every editing intent commits its mutation, then
//! notifies subscribers and hands the document to the autosave manager.
//! Intents that reference a glyph that no longer exists do nothing.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

use kurbo::{Point, Vec2};
use url::Url;
use uuid::Uuid;

use crate::background::{self, BackgroundFetcher, BackgroundImage, ByteFetcher, FetchState};
use crate::geometry;
use crate::model::{EmojiArt, Glyph, GlyphId};
use crate::storage::{AutoSaveManager, SaveTarget, Storage};

/// Change notifications published by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The persisted content (glyphs or background locator) changed.
    Changed,
    /// The selection changed.
    SelectionChanged,
    /// The decoded background image was cleared or replaced.
    BackgroundImageChanged,
}

/// Stateful owner of one EmojiArt document.
///
/// Two documents are equal when they share the same identifier, regardless
/// of content.
pub struct EmojiArtDocument {
    id: Uuid,
    emoji_art: EmojiArt,
    selection: BTreeSet<GlyphId>,
    background: BackgroundFetcher,
    autosave: AutoSaveManager,
    subscribers: Vec<Sender<DocumentEvent>>,
}

impl EmojiArtDocument {
    /// Create a document with a fresh identifier, persisted in `storage`.
    pub fn new(storage: Arc<dyn Storage>, fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::with_id(Uuid::new_v4(), storage, fetcher)
    }

    /// Open the document stored under `id`, or an empty one if there is none.
    pub fn with_id(id: Uuid, storage: Arc<dyn Storage>, fetcher: Arc<dyn ByteFetcher>) -> Self {
        let target = SaveTarget::Keyed {
            storage,
            key: id.to_string(),
        };
        Self::from_target(id, target, fetcher)
    }

    /// Open the document saved at `path`, or an empty one if the file is
    /// missing or unreadable. Changes are saved back to `path`.
    pub fn open_file(path: impl Into<PathBuf>, fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::from_target(Uuid::new_v4(), SaveTarget::Path(path.into()), fetcher)
    }

    fn from_target(id: Uuid, target: SaveTarget, fetcher: Arc<dyn ByteFetcher>) -> Self {
        let mut autosave = AutoSaveManager::new(target);
        let emoji_art = autosave.load();
        log::debug!(
            "Opened document {} from {} with {} glyphs",
            id,
            autosave.target(),
            emoji_art.len()
        );

        let mut background = BackgroundFetcher::new(fetcher);
        background.request(emoji_art.background());

        Self {
            id,
            emoji_art,
            selection: BTreeSet::new(),
            background,
            autosave,
            subscribers: Vec::new(),
        }
    }

    /// Stable identifier, also the storage key for keyed documents.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Throttle saves to at most one per `interval`. Zero saves on every intent.
    pub fn set_autosave_interval(&mut self, interval: Duration) {
        self.autosave.set_interval(interval);
    }

    /// Receive change notifications. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<DocumentEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    // MARK: queries

    pub fn emoji_art(&self) -> &EmojiArt {
        &self.emoji_art
    }

    /// Glyphs in z-order.
    pub fn glyphs(&self) -> &[Glyph] {
        self.emoji_art.glyphs()
    }

    pub fn background_url(&self) -> Option<&Url> {
        self.emoji_art.background()
    }

    /// The decoded background, once its fetch has resolved.
    pub fn background_image(&self) -> Option<&BackgroundImage> {
        self.background.image()
    }

    pub fn fetch_state(&self) -> &FetchState {
        self.background.state()
    }

    pub fn is_selected(&self, id: GlyphId) -> bool {
        self.selection.contains(&id)
    }

    pub fn selection_count(&self) -> usize {
        self.selection.len()
    }

    /// Selected glyph ids in ascending order.
    pub fn selected_glyphs(&self) -> impl Iterator<Item = GlyphId> + '_ {
        self.selection.iter().copied()
    }

    // MARK: intents

    /// Place a glyph at a document location. Returns `None` for empty text.
    pub fn add_glyph(&mut self, text: &str, at: Point, size: f64) -> Option<GlyphId> {
        let (x, y) = geometry::grid_offset(at.to_vec2());
        let id = self.emoji_art.add_glyph(text, x, y, size as u32)?;
        self.did_change();
        Some(id)
    }

    /// Remove every glyph and clear the selection.
    pub fn remove_all_glyphs(&mut self) {
        self.emoji_art.remove_all_glyphs();
        self.clear_selection();
        self.did_change();
    }

    /// Add `id` to the selection, or remove it if already selected.
    pub fn toggle_selection(&mut self, id: GlyphId) {
        if !self.selection.remove(&id) {
            if !self.emoji_art.contains(id) {
                return;
            }
            self.selection.insert(id);
        }
        self.notify(DocumentEvent::SelectionChanged);
    }

    pub fn deselect_all(&mut self) {
        self.clear_selection();
    }

    pub fn move_glyph(&mut self, id: GlyphId, by: Vec2) {
        if self.offset_glyph(id, by) {
            self.did_change();
        }
    }

    /// Move every selected glyph by the same offset.
    pub fn move_selected(&mut self, by: Vec2) {
        let ids: Vec<GlyphId> = self.selection.iter().copied().collect();
        let mut moved = false;
        for id in ids {
            moved |= self.offset_glyph(id, by);
        }
        if moved {
            self.did_change();
        }
    }

    /// Multiply a glyph's size, rounding half to even.
    pub fn scale_glyph(&mut self, id: GlyphId, by: f64) {
        if self.resize_glyph(id, by) {
            self.did_change();
        }
    }

    pub fn scale_selected(&mut self, by: f64) {
        let ids: Vec<GlyphId> = self.selection.iter().copied().collect();
        let mut scaled = false;
        for id in ids {
            scaled |= self.resize_glyph(id, by);
        }
        if scaled {
            self.did_change();
        }
    }

    /// Replace the background locator and start fetching it.
    ///
    /// The current image is cleared right away; a fetch still running for a
    /// previous locator will never be applied.
    pub fn set_background(&mut self, locator: Option<Url>) {
        let locator = locator.map(background::image_url);
        self.emoji_art.set_background(locator);

        let revision = self.background.revision();
        self.background.request(self.emoji_art.background());
        self.did_change();
        if self.background.revision() != revision {
            self.notify(DocumentEvent::BackgroundImageChanged);
        }
    }

    // MARK: background results

    /// Apply finished background fetches without blocking.
    ///
    /// Call this from the thread that owns the document. Returns the number of
    /// fetch results received, including stale ones that were discarded.
    pub fn poll_background(&mut self) -> usize {
        let revision = self.background.revision();
        let handled = self.background.poll(self.emoji_art.background());
        self.after_background(revision);
        handled
    }

    /// Like [`poll_background`](Self::poll_background), but blocks up to
    /// `timeout` for the first result.
    pub fn wait_for_background(&mut self, timeout: Duration) -> usize {
        let revision = self.background.revision();
        let handled = self.background.wait(timeout, self.emoji_art.background());
        self.after_background(revision);
        handled
    }

    /// Save pending changes now, ignoring the autosave interval.
    pub fn flush(&mut self) -> bool {
        self.autosave.flush(&self.emoji_art)
    }

    // MARK: helpers

    fn after_background(&mut self, revision: u64) {
        if self.background.revision() != revision {
            self.notify(DocumentEvent::BackgroundImageChanged);
        }
    }

    fn offset_glyph(&mut self, id: GlyphId, by: Vec2) -> bool {
        let (dx, dy) = geometry::grid_offset(by);
        match self.emoji_art.glyph_mut(id) {
            Some(glyph) => {
                glyph.offset(dx, dy);
                true
            }
            None => false,
        }
    }

    fn resize_glyph(&mut self, id: GlyphId, by: f64) -> bool {
        if !by.is_finite() || by <= 0.0 {
            log::debug!("Ignoring scale factor {} for glyph {}", by, id);
            return false;
        }
        match self.emoji_art.glyph_mut(id) {
            Some(glyph) => {
                let size = geometry::scale_size(glyph.size(), by);
                glyph.set_size(size);
                true
            }
            None => false,
        }
    }

    fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.notify(DocumentEvent::SelectionChanged);
        }
    }

    fn did_change(&mut self) {
        self.notify(DocumentEvent::Changed);
        self.autosave.mark_dirty();
        self.autosave.maybe_save(&self.emoji_art);
    }

    fn notify(&mut self, event: DocumentEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl PartialEq for EmojiArtDocument {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EmojiArtDocument {}

impl Hash for EmojiArtDocument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EmojiArtDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmojiArtDocument")
            .field("id", &self.id)
            .field("emoji_art", &self.emoji_art)
            .field("selection", &self.selection)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl Drop for EmojiArtDocument {
    fn drop(&mut self) {
        self.flush();
    }
}
