//! Candidate classification: area-band selection plus concentricity
//! validation (pipeline steps 1–2).

use log::{debug, info};
use nalgebra::Point2;

use crate::cell::Cell;
use crate::error::GridReadError;
use crate::params::ClassifyParams;

/// Classification outcome: the surviving cells (centroids computed) and the
/// statistics needed to diagnose a bad photograph.
#[derive(Debug)]
pub struct Classified {
    pub cells: Vec<Cell>,
    /// Nominal cell side derived from the area band,
    /// `sqrt((min + max) / 2)`.
    pub avg_side: f64,
    pub stats: ClassifyStats,
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct ClassifyStats {
    /// Contours with fewer than three vertices, dropped up front.
    pub malformed: usize,
    pub candidates: usize,
    pub rejected_small: usize,
    pub rejected_large: usize,
    /// In-band shapes that failed the concentricity test.
    pub rejected_shape: usize,
    pub band_min: f64,
    pub band_max: f64,
}

/// Dominant area cluster `[min, max]` from an ascending-sorted area list.
///
/// Starting at `anchor`, walk outward while consecutive areas stay within
/// `ratio_tol` of each other; the walk ends at the cluster edges.
fn area_band(
    sorted_areas: &[f64],
    anchor: usize,
    ratio_tol: f64,
) -> Result<(f64, f64), GridReadError> {
    if anchor >= sorted_areas.len() {
        return Err(GridReadError::AnchorOutOfRange {
            anchor,
            candidates: sorted_areas.len(),
        });
    }

    let mut lo = anchor;
    while lo > 0 && sorted_areas[lo - 1] > 0.0 && sorted_areas[lo] / sorted_areas[lo - 1] < ratio_tol
    {
        lo -= 1;
    }
    let mut hi = anchor;
    while hi + 1 < sorted_areas.len()
        && sorted_areas[hi] > 0.0
        && sorted_areas[hi + 1] / sorted_areas[hi] < ratio_tol
    {
        hi += 1;
    }
    Ok((sorted_areas[lo], sorted_areas[hi]))
}

/// Classify raw contour polygons into valid grid-cell candidates.
pub fn classify(
    contours: Vec<Vec<Point2<f64>>>,
    params: &ClassifyParams,
) -> Result<Classified, GridReadError> {
    let mut stats = ClassifyStats::default();

    let mut candidates = Vec::with_capacity(contours.len());
    for polygon in contours {
        match Cell::new(polygon) {
            Ok(cell) => candidates.push(cell),
            Err(GridReadError::MalformedShape { .. }) => stats.malformed += 1,
            Err(e) => return Err(e),
        }
    }
    stats.candidates = candidates.len();
    if candidates.is_empty() {
        return Err(GridReadError::EmptyCandidateSet {
            candidates: 0,
            band_min: 0.0,
            band_max: 0.0,
        });
    }

    let mut sorted_areas: Vec<f64> = candidates.iter().map(Cell::area).collect();
    sorted_areas.sort_by(|a, b| a.total_cmp(b));

    let anchor = params.area_anchor.unwrap_or(sorted_areas.len() / 2);
    let (band_min, band_max) = area_band(&sorted_areas, anchor, params.area_ratio_tol)?;
    stats.band_min = band_min;
    stats.band_max = band_max;
    let avg_side = ((band_min + band_max) / 2.0).sqrt();
    debug!(
        "area band [{band_min:.1}, {band_max:.1}] from anchor {anchor}, nominal side {avg_side:.2}"
    );

    let mut cells = Vec::new();
    for mut cell in candidates {
        if cell.area() < band_min {
            stats.rejected_small += 1;
            continue;
        }
        if cell.area() > band_max {
            stats.rejected_large += 1;
            continue;
        }

        cell.compute_centroid();
        if !is_concentric(&cell, params.concentricity_divisor) {
            stats.rejected_shape += 1;
            continue;
        }
        cells.push(cell);
    }

    info!(
        "classified {} grid cells out of {} candidates ({} small, {} large, {} non-concentric)",
        cells.len(),
        stats.candidates,
        stats.rejected_small,
        stats.rejected_large,
        stats.rejected_shape
    );

    if cells.is_empty() {
        return Err(GridReadError::EmptyCandidateSet {
            candidates: stats.candidates,
            band_min,
            band_max,
        });
    }

    Ok(Classified {
        cells,
        avg_side,
        stats,
    })
}

/// Every vertex must lie at or beyond `side / divisor` from the centroid;
/// closer vertices indicate a multi-lobed or merged contour.
fn is_concentric(cell: &Cell, divisor: f64) -> bool {
    let min_radius = cell.side_length() / divisor;
    let min_radius_sq = min_radius * min_radius;
    cell.polygon().iter().all(|p| {
        cell.squared_distance_to(*p)
            .is_some_and(|d| d >= min_radius_sq)
    })
}
