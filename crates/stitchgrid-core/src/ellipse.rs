//! Least-squares ellipse fitting.
//!
//! Only the fitted center is exposed: the reconstruction pipeline uses it as
//! a noise-robust centroid for jagged contours, where the raw vertex mean is
//! biased by contour artifacts.

use nalgebra::{DMatrix, Point2, Vector2};

/// Fit a conic `ax² + bxy + cy² + dx + ey + f = 0` to the points and return
/// its center.
///
/// The points are translated to their mean before fitting to keep the design
/// matrix well conditioned; the nullspace of the design matrix is taken from
/// the SVD. Returns `None` for fewer than 5 points, when the fitted conic is
/// not an ellipse, or when the center equations are singular.
pub fn fit_ellipse_center(points: &[Point2<f64>]) -> Option<Point2<f64>> {
    if points.len() < 5 {
        return None;
    }

    let n = points.len() as f64;
    let mean = points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords)
        / n;

    let mut design = DMatrix::<f64>::zeros(points.len(), 6);
    for (row, p) in points.iter().enumerate() {
        let x = p.x - mean.x;
        let y = p.y - mean.y;
        design[(row, 0)] = x * x;
        design[(row, 1)] = x * y;
        design[(row, 2)] = y * y;
        design[(row, 3)] = x;
        design[(row, 4)] = y;
        design[(row, 5)] = 1.0;
    }

    // The conic coefficients span the right singular vector with the
    // smallest singular value.
    let svd = design.svd(false, true);
    let v_t = svd.v_t?;
    let conic = v_t.row(v_t.nrows() - 1);
    let (a, b, c, d, e) = (conic[0], conic[1], conic[2], conic[3], conic[4]);

    // Ellipse discriminant: b² − 4ac < 0.
    if b * b - 4.0 * a * c >= 0.0 {
        return None;
    }

    // Center is where the conic gradient vanishes:
    //   2a·x + b·y = −d
    //   b·x + 2c·y = −e
    let det = 4.0 * a * c - b * b;
    if det.abs() < 1e-12 {
        return None;
    }
    let cx = (b * e - 2.0 * c * d) / det;
    let cy = (b * d - 2.0 * a * e) / det;

    Some(Point2::new(cx + mean.x, cy + mean.y))
}
