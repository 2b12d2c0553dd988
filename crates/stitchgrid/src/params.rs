use crate::estimator::FitModel;
use serde::{Deserialize, Serialize};
use stitchgrid_core::GridIndex;

/// Binarization parameters (spec'd as part of the core pipeline since they
/// directly control classification robustness).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PreprocessParams {
    /// Median-filter radius in pixels (1 → 3×3 window).
    pub median_radius: u32,
    /// Side length of the thumbnail used as an illumination baseline.
    pub baseline_size: u32,
    /// Gaussian sigma applied to the thumbnail before upscaling.
    pub baseline_sigma: f32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            median_radius: 1,
            baseline_size: 50,
            // Derived sigma of a 7×7 kernel: 0.3·((7−1)·0.5−1)+0.8.
            baseline_sigma: 1.4,
        }
    }
}

/// Candidate classification parameters (area band + concentricity test).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClassifyParams {
    /// Anchor index into the ascending sorted area list from which the
    /// dominant-cluster scan starts. `None` uses the middle of the list,
    /// which scales with candidate count.
    pub area_anchor: Option<usize>,
    /// Consecutive areas within this ratio belong to the same cluster.
    pub area_ratio_tol: f64,
    /// Every vertex must lie at least `side_length / divisor` from the
    /// centroid; smaller radii indicate multi-lobed or merged contours.
    pub concentricity_divisor: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            area_anchor: None,
            area_ratio_tol: 1.01,
            concentricity_divisor: 2.25,
        }
    }
}

/// Neighbour linking parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LinkParams {
    /// Two cells are linkable when their squared centroid distance is below
    /// `multiplier × avg_side²`. The default of 2 admits lattice neighbours
    /// and excludes diagonals on a regular grid.
    pub proximity_multiplier: f64,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            proximity_multiplier: 2.0,
        }
    }
}

/// Parameters for the whole reconstruction pipeline.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GridReaderParams {
    pub preprocess: PreprocessParams,
    pub classify: ClassifyParams,
    pub link: LinkParams,
    pub extract: ExtractParams,
    /// Coordinate model fitted during calibration.
    pub fit_model: FitModel,
    /// Grid slot holding the reference cell for similarity scoring. `None`
    /// picks the occupied slot nearest the grid centre.
    pub template_slot: Option<GridIndex>,
}

/// Canonical-image extraction and matching parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExtractParams {
    /// Canonical image side length as a fraction of the average cell side.
    pub output_size_factor: f64,
    /// Padding (pixels) around the search image for template matching.
    pub match_padding: u32,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            output_size_factor: 0.8,
            match_padding: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_reference_constants() {
        let p = GridReaderParams::default();
        assert!((p.preprocess.baseline_sigma - 1.4).abs() < 1e-6);
        assert_eq!(p.classify.area_anchor, None);
        assert!((p.classify.area_ratio_tol - 1.01).abs() < 1e-12);
        assert!((p.classify.concentricity_divisor - 2.25).abs() < 1e-12);
        assert!((p.link.proximity_multiplier - 2.0).abs() < 1e-12);
        assert!((p.extract.output_size_factor - 0.8).abs() < 1e-12);
        assert_eq!(p.extract.match_padding, 1);
    }

    #[test]
    fn params_round_trip_through_json() {
        let mut p = GridReaderParams::default();
        p.classify.area_anchor = Some(100);
        p.template_slot = Some(GridIndex::new(10, 10));
        let json = serde_json::to_string(&p).unwrap();
        let back: GridReaderParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.classify.area_anchor, Some(100));
        assert_eq!(back.template_slot, Some(GridIndex::new(10, 10)));
    }
}
