//! A single detected grid cell: contour geometry, neighbour slots, logical
//! grid placement and canonical appearance.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use nalgebra::{Point2, Vector2};
use stitchgrid_core::{bounding_box, fit_ellipse_center, signed_area, Affine2, GridIndex};

use crate::error::GridReadError;

/// Directional neighbour slot of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Up,
    Right,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Up,
        Direction::Right,
        Direction::Down,
    ];

    #[inline]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
        }
    }

    /// Unit grid-index offset for a neighbour in this direction.
    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
        }
    }

    /// Displacement angle towards this neighbour on a perfectly axis-aligned
    /// grid, in image coordinates (y down).
    #[inline]
    pub fn lattice_angle(self) -> f64 {
        match self {
            Direction::Right => 0.0,
            Direction::Down => std::f64::consts::FRAC_PI_2,
            Direction::Left => std::f64::consts::PI,
            Direction::Up => -std::f64::consts::FRAC_PI_2,
        }
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Up => 1,
            Direction::Right => 2,
            Direction::Down => 3,
        }
    }
}

/// One detected shape, enriched in stages as the pipeline proceeds:
/// centroid → neighbour links → grid index → canonical image.
///
/// Neighbour slots hold arena indices into the owning
/// [`CellGraph`](crate::graph::CellGraph), which enforces link symmetry.
#[derive(Clone, Debug)]
pub struct Cell {
    polygon: Vec<Point2<f64>>,
    signed_area: f64,
    area: f64,
    side_length: f64,
    centroid: Option<Point2<f64>>,
    pub(crate) neighbours: [Option<usize>; 4],
    grid_index: Option<GridIndex>,
    pub(crate) image: Option<GrayImage>,
    pub(crate) mask: Option<GrayImage>,
    pub(crate) padded: Option<GrayImage>,
}

impl Cell {
    /// Build a cell from a closed contour polygon.
    ///
    /// Fails with [`GridReadError::MalformedShape`] for fewer than three
    /// vertices.
    pub fn new(polygon: Vec<Point2<f64>>) -> Result<Self, GridReadError> {
        if polygon.len() < 3 {
            return Err(GridReadError::MalformedShape {
                vertices: polygon.len(),
            });
        }
        let signed = signed_area(&polygon);
        let area = signed.abs();
        Ok(Self {
            polygon,
            signed_area: signed,
            area,
            side_length: area.sqrt(),
            centroid: None,
            neighbours: [None; 4],
            grid_index: None,
            image: None,
            mask: None,
            padded: None,
        })
    }

    pub fn polygon(&self) -> &[Point2<f64>] {
        &self.polygon
    }

    /// Signed contour area; the sign encodes the polygon winding.
    pub fn signed_area(&self) -> f64 {
        self.signed_area
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Nominal side length, `sqrt(area)`.
    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    /// Fit an ellipse to the contour and store its center as the centroid.
    ///
    /// The ellipse center is robust to jagged contour noise; for contours too
    /// short for a conic fit (or degenerate ones) the vertex mean is used.
    pub fn compute_centroid(&mut self) {
        let centroid = fit_ellipse_center(&self.polygon).unwrap_or_else(|| {
            let sum = self
                .polygon
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.coords);
            Point2::from(sum / self.polygon.len() as f64)
        });
        self.centroid = Some(centroid);
    }

    /// Centroid, available after [`Cell::compute_centroid`].
    pub fn centroid(&self) -> Option<Point2<f64>> {
        self.centroid
    }

    pub(crate) fn set_centroid(&mut self, c: Point2<f64>) {
        self.centroid = Some(c);
    }

    pub(crate) fn set_side_length(&mut self, side: f64) {
        self.side_length = side;
    }

    /// Vector from this cell's centroid to `target`.
    pub fn displacement_to(&self, target: Point2<f64>) -> Option<Vector2<f64>> {
        Some(target - self.centroid?)
    }

    /// Squared euclidean distance from the centroid to `target`; no square
    /// root on the proximity-testing path.
    pub fn squared_distance_to(&self, target: Point2<f64>) -> Option<f64> {
        Some(self.displacement_to(target)?.norm_squared())
    }

    pub fn neighbour(&self, direction: Direction) -> Option<usize> {
        self.neighbours[direction.slot()]
    }

    pub fn neighbour_count(&self) -> usize {
        self.neighbours.iter().flatten().count()
    }

    pub fn grid_index(&self) -> Option<GridIndex> {
        self.grid_index
    }

    /// Assign the grid index. A matching re-assignment is a no-op; a
    /// different value is reported as the conflicting existing index.
    pub(crate) fn assign_index(&mut self, index: GridIndex) -> Result<(), GridIndex> {
        match self.grid_index {
            None => {
                self.grid_index = Some(index);
                Ok(())
            }
            Some(existing) if existing == index => Ok(()),
            Some(existing) => Err(existing),
        }
    }

    /// Direct overwrite for the normalization pass, which shifts every index
    /// by a constant and is exempt from the set-once contract.
    pub(crate) fn shift_index(&mut self, dx: i32, dy: i32) {
        if let Some(gi) = self.grid_index {
            self.grid_index = Some(gi.offset(dx, dy));
        }
    }

    /// Canonical appearance raster, populated by the extraction stage.
    pub fn image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    /// Canonical occupancy mask, extracted from the binarized source.
    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    /// Extract the rotation/position-normalized `size × size` raster.
    ///
    /// Crops the source to the polygon's bounding box, then warps so the
    /// centroid lands on the output center with the local grid axes mapped to
    /// the output axes. `rotation` is the cell's estimated grid rotation; the
    /// warp applies its inverse. Deterministic for identical inputs.
    pub fn extract_canonical(
        &self,
        source: &GrayImage,
        rotation: f64,
        size: u32,
    ) -> Option<GrayImage> {
        let centroid = self.centroid?;
        let (min, max) = bounding_box(&self.polygon)?;
        if size == 0 || source.width() == 0 || source.height() == 0 {
            return None;
        }

        let x0 = (min.x.floor() as i64).clamp(0, source.width() as i64 - 1) as u32;
        let y0 = (min.y.floor() as i64).clamp(0, source.height() as i64 - 1) as u32;
        let x1 = (max.x.ceil() as i64).clamp(0, source.width() as i64 - 1) as u32;
        let y1 = (max.y.ceil() as i64).clamp(0, source.height() as i64 - 1) as u32;
        let crop = image::imageops::crop_imm(source, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image();

        let cx = centroid.x - x0 as f64;
        let cy = centroid.y - y0 as f64;
        let dc = size as f64 * 0.5;
        let (rx, ry) = ((-rotation).cos(), (-rotation).sin());

        // Centroid plus two unit offsets onto output center plus a rotated
        // unit basis.
        let src = [
            Point2::new(cx, cy),
            Point2::new(cx + 1.0, cy),
            Point2::new(cx, cy + 1.0),
        ];
        let dst = [
            Point2::new(dc, dc),
            Point2::new(dc + rx, dc + ry),
            Point2::new(dc - ry, dc + rx),
        ];
        let transform = Affine2::from_point_pairs(src, dst)?;
        let projection = Projection::from_matrix(transform.to_homogeneous_array())?;

        let mut out = GrayImage::new(size, size);
        warp_into(&crop, &projection, Interpolation::Bicubic, Luma([0u8]), &mut out);
        Some(out)
    }

    /// Copy of the canonical image with a `pad`-pixel border, the search
    /// image for template matching.
    pub(crate) fn padded_copy(&self, pad: u32) -> Option<GrayImage> {
        let img = self.image.as_ref()?;
        let mut out = GrayImage::new(img.width() + 2 * pad, img.height() + 2 * pad);
        image::imageops::replace(&mut out, img, pad as i64, pad as i64);
        Some(out)
    }

    /// Build and cache the padded search image; the scoring stage calls this
    /// once per cell so repeated matches reuse the buffer.
    pub(crate) fn ensure_padded(&mut self, pad: u32) {
        if self.padded.is_none() {
            self.padded = self.padded_copy(pad);
        }
    }

    /// Dissimilarity against `template`: `1 − best normalized
    /// cross-correlation` of the template over this cell's padded canonical
    /// image. 0 means identical appearance.
    ///
    /// Returns `None` when either canonical image is missing.
    pub fn match_score(&self, template: &Cell, pad: u32) -> Option<f32> {
        let template_img = template.image.as_ref()?;
        let padded_fallback;
        let padded = match &self.padded {
            Some(p) => p,
            None => {
                padded_fallback = self.padded_copy(pad)?;
                &padded_fallback
            }
        };
        if padded.width() < template_img.width() || padded.height() < template_img.height() {
            return None;
        }

        let scores = match_template(
            padded,
            template_img,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        Some(1.0 - extremes.max_value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn square_at(cx: f64, cy: f64, side: f64) -> Vec<Point2<f64>> {
        let h = side * 0.5;
        vec![
            Point2::new(cx - h, cy - h),
            Point2::new(cx + h, cy - h),
            Point2::new(cx + h, cy + h),
            Point2::new(cx - h, cy + h),
        ]
    }

    #[test]
    fn area_and_side_length_from_contour() {
        let cell = Cell::new(square_at(10.0, 10.0, 4.0)).unwrap();
        assert_relative_eq!(cell.area(), 16.0);
        assert_relative_eq!(cell.side_length(), 4.0);
        assert!(cell.area() >= 0.0);

        let mut reversed = square_at(10.0, 10.0, 4.0);
        reversed.reverse();
        let cell = Cell::new(reversed).unwrap();
        assert!(cell.signed_area() < 0.0);
        assert_relative_eq!(cell.area(), 16.0);
        assert_relative_eq!(cell.side_length(), cell.area().sqrt());
    }

    #[test]
    fn too_few_vertices_is_malformed() {
        let err = Cell::new(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).unwrap_err();
        assert_eq!(err, GridReadError::MalformedShape { vertices: 2 });
    }

    #[test]
    fn centroid_of_square_is_its_center() {
        let mut cell = Cell::new(square_at(10.0, 20.0, 6.0)).unwrap();
        assert!(cell.centroid().is_none());
        cell.compute_centroid();
        let c = cell.centroid().unwrap();
        assert_relative_eq!(c.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn displacement_and_squared_distance() {
        let mut cell = Cell::new(square_at(0.0, 0.0, 2.0)).unwrap();
        cell.compute_centroid();
        let d = cell.displacement_to(Point2::new(3.0, 4.0)).unwrap();
        assert_relative_eq!(d.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(d.y, 4.0, epsilon = 1e-9);
        assert_relative_eq!(
            cell.squared_distance_to(Point2::new(3.0, 4.0)).unwrap(),
            25.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn grid_index_is_set_once() {
        let mut cell = Cell::new(square_at(0.0, 0.0, 2.0)).unwrap();
        assert!(cell.assign_index(GridIndex::new(2, 3)).is_ok());
        // Same value is an idempotent no-op.
        assert!(cell.assign_index(GridIndex::new(2, 3)).is_ok());
        // A different value reports the existing occupant.
        assert_eq!(
            cell.assign_index(GridIndex::new(0, 0)),
            Err(GridIndex::new(2, 3))
        );
        assert_eq!(cell.grid_index(), Some(GridIndex::new(2, 3)));
    }

    #[test]
    fn direction_opposites_and_offsets() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            let (dx, dy) = dir.offset();
            let (ox, oy) = dir.opposite().offset();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
        assert_eq!(Direction::Left.offset(), (-1, 0));
        assert_eq!(Direction::Up.offset(), (0, -1));
    }

    #[test]
    fn match_of_identical_cells_is_near_zero() {
        let mut cell = Cell::new(square_at(8.0, 8.0, 8.0)).unwrap();
        cell.compute_centroid();

        // Textured source so the correlation is non-trivial.
        let source = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 13 + y * 7) % 251) as u8]));
        let canonical = cell.extract_canonical(&source, 0.0, 6).unwrap();
        assert_eq!(canonical.dimensions(), (6, 6));
        cell.image = Some(canonical);

        let score = cell.match_score(&cell.clone(), 1).unwrap();
        assert!(score.abs() < 1e-3, "self-match score was {score}");
    }

    #[test]
    fn extraction_is_deterministic() {
        let mut cell = Cell::new(square_at(8.0, 8.0, 8.0)).unwrap();
        cell.compute_centroid();
        let source = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        let a = cell.extract_canonical(&source, 0.3, 6).unwrap();
        let b = cell.extract_canonical(&source, 0.3, 6).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
