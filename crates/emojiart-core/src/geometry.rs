//! Conversions between view space and document space.
//!
//! Document coordinates are integer offsets from the center of the canvas.
//! View coordinates are pixels with the origin at the top-left of the viewport.

use kurbo::{Point, Size, Vec2};

/// Center point of a viewport.
pub fn center(viewport: Size) -> Point {
    Point::new(viewport.width / 2.0, viewport.height / 2.0)
}

/// Largest scale at which `content` fits entirely inside `viewport`.
///
/// Returns `None` when `content` has no extent in either dimension.
pub fn fit_scale(content: Size, viewport: Size) -> Option<f64> {
    if !(content.width > 0.0 && content.height > 0.0) {
        return None;
    }
    let horizontal = viewport.width / content.width;
    let vertical = viewport.height / content.height;
    Some(horizontal.min(vertical))
}

/// Convert a view point into document-local coordinates.
///
/// `pan` is the view-space pan offset (already multiplied by `zoom`).
pub fn view_to_document(point: Point, viewport: Size, pan: Vec2, zoom: f64) -> Point {
    let local = point - center(viewport) - pan;
    (local / zoom).to_point()
}

/// Convert a document point into view coordinates.
pub fn document_to_view(point: Point, viewport: Size, pan: Vec2, zoom: f64) -> Point {
    center(viewport) + pan + point.to_vec2() * zoom
}

/// Integer grid offset for a continuous delta, truncating toward zero.
pub fn grid_offset(delta: Vec2) -> (i32, i32) {
    (delta.x as i32, delta.y as i32)
}

/// Scale an integer size, rounding half to even so repeated fractional
/// scaling does not drift in one direction. Never returns less than 1.
pub fn scale_size(size: u32, factor: f64) -> u32 {
    let scaled = (f64::from(size) * factor).round_ties_even();
    if scaled < 1.0 {
        1
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let c = center(Size::new(800.0, 600.0));
        assert_eq!(c, Point::new(400.0, 300.0));
    }

    #[test]
    fn test_fit_scale_picks_limiting_axis() {
        let scale = fit_scale(Size::new(400.0, 100.0), Size::new(800.0, 600.0)).unwrap();
        assert!((scale - 2.0).abs() < f64::EPSILON);

        let scale = fit_scale(Size::new(100.0, 300.0), Size::new(800.0, 600.0)).unwrap();
        assert!((scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_scale_zero_extent() {
        assert!(fit_scale(Size::new(0.0, 100.0), Size::new(800.0, 600.0)).is_none());
        assert!(fit_scale(Size::new(100.0, 0.0), Size::new(800.0, 600.0)).is_none());
    }

    #[test]
    fn test_view_document_roundtrip() {
        let viewport = Size::new(800.0, 600.0);
        let pan = Vec2::new(30.0, -20.0);
        let zoom = 1.5;

        let original = Point::new(123.0, 456.0);
        let doc = view_to_document(original, viewport, pan, zoom);
        let back = document_to_view(doc, viewport, pan, zoom);

        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_view_to_document_compensates_pan_and_zoom() {
        let viewport = Size::new(200.0, 100.0);
        // (150, 70) - center (100, 50) - pan (10, 10) = (40, 10), / 2
        let p = view_to_document(Point::new(150.0, 70.0), viewport, Vec2::new(10.0, 10.0), 2.0);
        assert_eq!(p, Point::new(20.0, 5.0));
    }

    #[test]
    fn test_grid_offset_truncates() {
        assert_eq!(grid_offset(Vec2::new(2.9, -2.9)), (2, -2));
    }

    #[test]
    fn test_scale_size_rounds_half_to_even() {
        assert_eq!(scale_size(5, 0.5), 2); // 2.5 -> 2
        assert_eq!(scale_size(7, 0.5), 4); // 3.5 -> 4
        assert_eq!(scale_size(40, 2.0), 80);
        assert_eq!(scale_size(40, 1.0), 40);
    }

    #[test]
    fn test_scale_size_never_zero() {
        assert_eq!(scale_size(1, 0.1), 1);
    }
}
