//! Gesture composition for the canvas.
//!
//! The composer keeps a committed ("steady") value and an in-flight ("live")
//! value for each continuous gesture. Live values only affect what is drawn;
//! ending a gesture folds them into the steady state or commits them to the
//! document as an editing intent. Pinch and drag mean different things
//! depending on whether anything is selected.

use kurbo::{Point, Size, Vec2};

use crate::background;
use crate::config::EditorConfig;
use crate::document::EmojiArtDocument;
use crate::geometry;
use crate::model::{Glyph, GlyphId};

/// An already-recognized pointer gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Pinch in progress; `scale` is relative to where the pinch started.
    PinchChanged { scale: f64 },
    PinchEnded { scale: f64 },
    /// Drag in progress. `origin` is the glyph under the pointer when the
    /// drag started, if any. `translation` is in view units.
    DragChanged {
        origin: Option<GlyphId>,
        translation: Vec2,
    },
    DragEnded {
        origin: Option<GlyphId>,
        translation: Vec2,
    },
    /// Single tap on a glyph, or on the empty canvas.
    Tap { target: Option<GlyphId> },
    DoubleTap,
    /// External payload released at a view location.
    Drop { items: Vec<String>, location: Point },
}

/// Combines steady and live pan/zoom/move values for one canvas view.
#[derive(Debug, Clone)]
pub struct GestureComposer {
    viewport: Size,
    steady_zoom: f64,
    live_zoom: f64,
    /// Pan offsets are in document units.
    steady_pan: Vec2,
    live_pan: Vec2,
    live_move: Vec2,
    min_zoom: f64,
    max_zoom: f64,
    default_emoji_size: f64,
}

impl GestureComposer {
    pub fn new(viewport: Size) -> Self {
        Self::from_config(&EditorConfig::default(), viewport)
    }

    pub fn from_config(config: &EditorConfig, viewport: Size) -> Self {
        Self {
            viewport,
            steady_zoom: 1.0,
            live_zoom: 1.0,
            steady_pan: Vec2::ZERO,
            live_pan: Vec2::ZERO,
            live_move: Vec2::ZERO,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            default_emoji_size: config.default_emoji_size,
        }
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn steady_zoom(&self) -> f64 {
        self.steady_zoom
    }

    pub fn steady_pan(&self) -> Vec2 {
        self.steady_pan
    }

    /// Whether a pinch or drag is in progress.
    pub fn is_live(&self) -> bool {
        self.live_zoom != 1.0
            || self.live_pan != Vec2::ZERO
            || self.live_move != Vec2::ZERO
    }

    /// Abandon any in-progress gesture without committing it.
    pub fn cancel(&mut self) {
        self.live_zoom = 1.0;
        self.live_pan = Vec2::ZERO;
        self.live_move = Vec2::ZERO;
    }

    // MARK: rendering

    /// Effective canvas zoom. A live pinch only zooms the canvas when
    /// nothing is selected.
    pub fn zoom_scale(&self, selection_count: usize) -> f64 {
        if selection_count == 0 {
            self.steady_zoom * self.live_zoom
        } else {
            self.steady_zoom
        }
    }

    /// Effective pan in view units.
    pub fn pan_offset(&self, selection_count: usize) -> Vec2 {
        (self.steady_pan + self.live_pan) * self.zoom_scale(selection_count)
    }

    /// Where a glyph is drawn. Selected glyphs follow a live move.
    pub fn glyph_position(&self, glyph: &Glyph, selected: bool, selection_count: usize) -> Point {
        let mut location = glyph.location();
        if selected {
            location += self.live_move;
        }
        geometry::document_to_view(
            location,
            self.viewport,
            self.pan_offset(selection_count),
            self.zoom_scale(selection_count),
        )
    }

    /// Font size a glyph is drawn at. Selected glyphs follow a live pinch.
    pub fn glyph_font_size(&self, glyph: &Glyph, selected: bool, selection_count: usize) -> f64 {
        let size = f64::from(glyph.size()) * self.zoom_scale(selection_count);
        if selected { size * self.live_zoom } else { size }
    }

    /// Convert a view point to document coordinates using the steady pan.
    pub fn to_document(&self, point: Point, selection_count: usize) -> Point {
        let zoom = self.zoom_scale(selection_count);
        geometry::view_to_document(point, self.viewport, self.steady_pan * zoom, zoom)
    }

    // MARK: gestures

    /// Dispatch a gesture. Returns true when it changed the composer or the
    /// document.
    pub fn handle(&mut self, gesture: Gesture, document: &mut EmojiArtDocument) -> bool {
        match gesture {
            Gesture::PinchChanged { scale } => self.pinch_changed(scale),
            Gesture::PinchEnded { scale } => self.pinch_ended(scale, document),
            Gesture::DragChanged {
                origin,
                translation,
            } => self.drag_changed(origin, translation, document),
            Gesture::DragEnded {
                origin,
                translation,
            } => self.drag_ended(origin, translation, document),
            Gesture::Tap { target } => {
                self.tap(target, document);
                true
            }
            Gesture::DoubleTap => self.double_tap(document),
            Gesture::Drop { items, location } => self.drop_items(&items, location, document),
        }
    }

    pub fn pinch_changed(&mut self, scale: f64) -> bool {
        if !valid_scale(scale) {
            return false;
        }
        self.live_zoom = scale;
        true
    }

    /// Commit a pinch: zooms the canvas, or scales the selection if there
    /// is one.
    pub fn pinch_ended(&mut self, scale: f64, document: &mut EmojiArtDocument) -> bool {
        self.live_zoom = 1.0;
        if !valid_scale(scale) {
            return false;
        }
        if document.selection_count() == 0 {
            self.steady_zoom = (self.steady_zoom * scale).clamp(self.min_zoom, self.max_zoom);
        } else {
            document.scale_selected(scale);
        }
        true
    }

    pub fn drag_changed(
        &mut self,
        origin: Option<GlyphId>,
        translation: Vec2,
        document: &EmojiArtDocument,
    ) -> bool {
        let delta = translation / self.zoom_scale(document.selection_count());
        if moves_selection(origin, document) {
            self.live_move = delta;
        } else {
            self.live_pan = delta;
        }
        true
    }

    /// Commit a drag: moves the selection when it started on a selected
    /// glyph, otherwise pans the canvas.
    pub fn drag_ended(
        &mut self,
        origin: Option<GlyphId>,
        translation: Vec2,
        document: &mut EmojiArtDocument,
    ) -> bool {
        self.live_pan = Vec2::ZERO;
        self.live_move = Vec2::ZERO;

        let delta = translation / self.zoom_scale(document.selection_count());
        if moves_selection(origin, document) {
            document.move_selected(delta);
        } else {
            self.steady_pan += delta;
        }
        true
    }

    pub fn tap(&mut self, target: Option<GlyphId>, document: &mut EmojiArtDocument) {
        match target {
            Some(id) => document.toggle_selection(id),
            None => document.deselect_all(),
        }
    }

    /// Zoom to fit the background image and reset the pan. Does nothing
    /// without a loaded image of non-zero extent.
    pub fn double_tap(&mut self, document: &EmojiArtDocument) -> bool {
        let Some(image) = document.background_image() else {
            return false;
        };
        let Some(zoom) = geometry::fit_scale(image.size(), self.viewport) else {
            return false;
        };
        self.steady_zoom = zoom;
        self.steady_pan = Vec2::ZERO;
        true
    }

    /// Handle a drop. The first item that names a background image wins;
    /// otherwise every non-empty item becomes a glyph at `location`.
    pub fn drop_items(
        &mut self,
        items: &[String],
        location: Point,
        document: &mut EmojiArtDocument,
    ) -> bool {
        if let Some(locator) = items.iter().find_map(|item| background::parse_locator(item)) {
            log::debug!("Dropped background {}", locator);
            document.set_background(Some(locator));
            return true;
        }

        let at = self.to_document(location, document.selection_count());
        let mut added = false;
        for item in items {
            added |= document
                .add_glyph(item.trim(), at, self.default_emoji_size)
                .is_some();
        }
        added
    }
}

fn valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

fn moves_selection(origin: Option<GlyphId>, document: &EmojiArtDocument) -> bool {
    origin.is_some_and(|id| document.is_selected(id))
}
