//! Polygon measurements over closed point sequences.
//!
//! Polygons are ordered vertex lists with an implicit closing edge from the
//! last vertex back to the first. They are assumed simple (no
//! self-intersections); measurements on self-intersecting input are not
//! meaningful.

use nalgebra::Point2;

/// Signed area of a closed polygon via the shoelace formula.
///
/// The sign encodes the winding: positive for counter-clockwise vertex
/// order in a y-down image coordinate frame. Returns 0 for fewer than
/// three vertices.
pub fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, p) in polygon.iter().enumerate() {
        let q = &polygon[(i + 1) % polygon.len()];
        twice_area += p.x * q.y - q.x * p.y;
    }
    0.5 * twice_area
}

/// Axis-aligned bounding box as `(min, max)` corners, inclusive.
///
/// Returns `None` for an empty vertex list.
pub fn bounding_box(polygon: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    let first = polygon.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &polygon[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}
