//! Pipeline output: the normalized sparse grid, per-cell appearance and the
//! similarity-score table.

use serde::Serialize;
use stitchgrid_core::GridIndex;

use crate::cell::Cell;
use crate::classify::ClassifyStats;
use crate::estimator::GridEstimator;
use crate::graph::CellGraph;

/// Dissimilarity of one occupied slot against the template cell.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CellScore {
    pub index: GridIndex,
    /// `1 − best normalized correlation`; 0 means identical appearance.
    pub score: f32,
}

/// A reconstructed grid: logically indexed cells, their canonical appearance
/// and the per-cell dissimilarity scores. Read-only after the pipeline
/// completes; rendering is the caller's concern.
#[derive(Debug)]
pub struct GridReconstruction {
    pub width: u32,
    pub height: u32,
    /// Cell arena, including canonical image/mask rasters.
    pub graph: CellGraph,
    /// Row-major `width × height` occupancy; empty slots had no detected
    /// counterpart.
    pub slots: Vec<Option<usize>>,
    /// One entry per occupied slot, in row-major slot order.
    pub scores: Vec<CellScore>,
    /// Maximum dissimilarity, for downstream normalization/visualization.
    pub max_score: f32,
    /// Slot whose cell served as the match template.
    pub template: GridIndex,
    /// Cells unreachable from the BFS seed, excluded from the grid.
    pub disconnected: usize,
    /// Fitted index→pixel model, for overlays and empty-slot recovery.
    pub estimator: GridEstimator,
    pub classify_stats: ClassifyStats,
}

impl GridReconstruction {
    /// Cell occupying the slot at normalized grid coordinate (x, y).
    pub fn cell_at(&self, x: u32, y: u32) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let id = self.slots[(y * self.width + x) as usize]?;
        self.graph.cell(id)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Serializable run report for the CLI/visualization collaborator.
    pub fn summary(&self) -> ReconstructionSummary {
        ReconstructionSummary {
            width: self.width,
            height: self.height,
            occupied: self.occupied_count(),
            disconnected: self.disconnected,
            template: self.template,
            max_score: self.max_score,
            scores: self.scores.clone(),
            classify: self.classify_stats,
        }
    }
}

/// Counts and scores of one reconstruction run, without the rasters.
#[derive(Clone, Debug, Serialize)]
pub struct ReconstructionSummary {
    pub width: u32,
    pub height: u32,
    pub occupied: usize,
    pub disconnected: usize,
    pub template: GridIndex,
    pub max_score: f32,
    pub scores: Vec<CellScore>,
    pub classify: ClassifyStats,
}
