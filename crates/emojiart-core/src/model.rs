//! Document model: the background locator and the ordered glyph sequence.

use serde::{Deserialize, Serialize};
use url::Url;

/// Identifier of a glyph, unique within one document.
pub type GlyphId = u64;

/// A single placed emoji.
///
/// `x` and `y` are offsets from the center of the document. Glyphs are only
/// created by [`EmojiArt::add_glyph`]; position and size change through the
/// document controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    text: String,
    x: i32,
    y: i32,
    size: u32,
    id: GlyphId,
}

impl Glyph {
    fn new(text: String, x: i32, y: i32, size: u32, id: GlyphId) -> Self {
        Self { text, x, y, size, id }
    }

    pub fn id(&self) -> GlyphId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// Font-size equivalent, always positive.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Position as a document point.
    pub fn location(&self) -> kurbo::Point {
        kurbo::Point::new(f64::from(self.x), f64::from(self.y))
    }

    pub(crate) fn offset(&mut self, dx: i32, dy: i32) {
        self.x = self.x.saturating_add(dx);
        self.y = self.y.saturating_add(dy);
    }

    pub(crate) fn set_size(&mut self, size: u32) {
        self.size = size.max(1);
    }
}

/// An EmojiArt document.
///
/// Insertion order of glyphs is their z-order. Ids come from a per-document
/// counter that only moves forward, so ids are never reused within one
/// instance, even after [`EmojiArt::remove_all_glyphs`].
#[derive(Debug, Clone, Default)]
pub struct EmojiArt {
    background: Option<Url>,
    glyphs: Vec<Glyph>,
    /// Last id handed out.
    last_id: GlyphId,
}

impl PartialEq for EmojiArt {
    // The id counter is bookkeeping, not content.
    fn eq(&self, other: &Self) -> bool {
        self.background == other.background && self.glyphs == other.glyphs
    }
}

impl Eq for EmojiArt {}

impl EmojiArt {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from already validated parts.
    ///
    /// The counter resumes after the largest existing id.
    pub(crate) fn from_parts(background: Option<Url>, glyphs: Vec<Glyph>) -> Self {
        let last_id = glyphs.iter().map(Glyph::id).max().unwrap_or(0);
        Self {
            background,
            glyphs,
            last_id,
        }
    }

    pub fn background(&self) -> Option<&Url> {
        self.background.as_ref()
    }

    pub fn set_background(&mut self, background: Option<Url>) {
        self.background = background;
    }

    /// Glyphs in z-order (back to front).
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Get a glyph by id.
    pub fn glyph(&self, id: GlyphId) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.id == id)
    }

    pub(crate) fn glyph_mut(&mut self, id: GlyphId) -> Option<&mut Glyph> {
        self.glyphs.iter_mut().find(|g| g.id == id)
    }

    /// Append a glyph and return its new id.
    ///
    /// Returns `None` (and consumes no id) when `text` is empty or every id
    /// has been used. A size of zero is raised to 1.
    pub fn add_glyph(&mut self, text: &str, x: i32, y: i32, size: u32) -> Option<GlyphId> {
        if text.is_empty() {
            return None;
        }
        let Some(id) = self.last_id.checked_add(1) else {
            log::warn!("Glyph ids exhausted, not adding {:?}", text);
            return None;
        };
        self.last_id = id;
        self.glyphs
            .push(Glyph::new(text.to_string(), x, y, size.max(1), id));
        Some(id)
    }

    /// Remove every glyph. The id counter is left untouched.
    pub fn remove_all_glyphs(&mut self) {
        self.glyphs.clear();
    }

    pub fn contains(&self, id: GlyphId) -> bool {
        self.glyph(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }
}
