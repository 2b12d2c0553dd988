//! 2D affine transforms from point correspondences.

use nalgebra::{Matrix3, Point2, Vector3};

/// A 2×3 affine map `p ↦ A·[p.x, p.y, 1]ᵀ`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub m: [[f64; 3]; 2],
}

impl Affine2 {
    /// Exact affine transform mapping three source points onto three
    /// destination points.
    ///
    /// Returns `None` when the source points are collinear (the defining
    /// system is singular).
    pub fn from_point_pairs(src: [Point2<f64>; 3], dst: [Point2<f64>; 3]) -> Option<Self> {
        let s = Matrix3::new(
            src[0].x, src[0].y, 1.0, //
            src[1].x, src[1].y, 1.0, //
            src[2].x, src[2].y, 1.0,
        );
        let inv = s.try_inverse()?;
        let u = inv * Vector3::new(dst[0].x, dst[1].x, dst[2].x);
        let v = inv * Vector3::new(dst[0].y, dst[1].y, dst[2].y);
        Some(Self {
            m: [[u[0], u[1], u[2]], [v[0], v[1], v[2]]],
        })
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let [[a, b, c], [d, e, f]] = self.m;
        Point2::new(a * p.x + b * p.y + c, d * p.x + e * p.y + f)
    }

    /// Row-major 3×3 homogeneous matrix, for handing the transform to raster
    /// warp primitives.
    pub fn to_homogeneous_array(&self) -> [f32; 9] {
        let [[a, b, c], [d, e, f]] = self.m;
        [
            a as f32, b as f32, c as f32, //
            d as f32, e as f32, f as f32, //
            0.0, 0.0, 1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn maps_defining_correspondences_exactly() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let dst = [
            Point2::new(10.0, 20.0),
            Point2::new(10.0, 21.0), // 90° rotation + translation
            Point2::new(9.0, 20.0),
        ];
        let t = Affine2::from_point_pairs(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let mapped = t.apply(*s);
            assert_relative_eq!(mapped.x, d.x, epsilon = 1e-12);
            assert_relative_eq!(mapped.y, d.y, epsilon = 1e-12);
        }
    }

    #[test]
    fn interpolates_linearly_between_correspondences() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(0.0, 4.0),
        ];
        let t = Affine2::from_point_pairs(src, dst).unwrap();
        let mid = t.apply(Point2::new(1.0, 1.0));
        assert_relative_eq!(mid.x, 2.0);
        assert_relative_eq!(mid.y, 2.0);
    }

    #[test]
    fn collinear_sources_are_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(Affine2::from_point_pairs(src, dst).is_none());
    }

    #[test]
    fn homogeneous_array_round_trips_the_map() {
        let t = Affine2 {
            m: [[0.5, -1.0, 3.0], [1.0, 0.5, -2.0]],
        };
        let h = t.to_homogeneous_array();
        let p = Point2::new(2.0, 4.0);
        let q = t.apply(p);
        assert_relative_eq!(
            h[0] as f64 * p.x + h[1] as f64 * p.y + h[2] as f64,
            q.x,
            epsilon = 1e-6
        );
        assert_relative_eq!(
            h[3] as f64 * p.x + h[4] as f64 * p.y + h[5] as f64,
            q.y,
            epsilon = 1e-6
        );
    }
}
