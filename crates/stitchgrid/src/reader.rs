//! The reconstruction pipeline: strictly sequential stages from a grayscale
//! photograph to a logically indexed grid.

use image::GrayImage;
use log::{debug, info};
use nalgebra::Point2;
use stitchgrid_core::GridIndex;

use crate::classify::classify;
use crate::error::GridReadError;
use crate::estimator::GridEstimator;
use crate::graph::CellGraph;
use crate::linking::link_cells;
use crate::params::GridReaderParams;
use crate::preprocess::{preprocess, Preprocessed};
use crate::result::{CellScore, GridReconstruction};

/// Reconstructs a stitched grid from a photograph.
///
/// The pipeline owns its cell graph exclusively for the duration of a run;
/// it runs to completion or fails outright, with no partial grids.
pub struct GridReader {
    params: GridReaderParams,
}

impl GridReader {
    pub fn new(params: GridReaderParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GridReaderParams {
        &self.params
    }

    /// Full run: binarize, trace contours, then reconstruct.
    pub fn process(&self, image: &GrayImage) -> Result<GridReconstruction, GridReadError> {
        let pre = preprocess(image, &self.params.preprocess);
        let contours = trace_contours(&pre.binary);
        info!("traced {} contours", contours.len());
        self.reconstruct(contours, &pre)
    }

    /// Reconstruction from already-traced contours (steps 1–7).
    ///
    /// Exposed separately so callers with their own segmentation can reuse
    /// the grid logic.
    pub fn reconstruct(
        &self,
        contours: Vec<Vec<Point2<f64>>>,
        pre: &Preprocessed,
    ) -> Result<GridReconstruction, GridReadError> {
        // 1–2. Classify candidates and validate shapes.
        let classified = classify(contours, &self.params.classify)?;
        let avg_side = classified.avg_side;
        let classify_stats = classified.stats;
        let mut graph = CellGraph::new(classified.cells);

        // 3. Link neighbours by proximity and dominant axis.
        link_cells(&mut graph, avg_side, &self.params.link)?;

        // 4. BFS index propagation from an arbitrary seed.
        let indexing = graph.assign_indices(0)?;

        // 5. Normalize indices to a (0,0) origin.
        let (width, height) = graph
            .normalize_indices()
            .ok_or(GridReadError::EmptyCandidateSet {
                candidates: graph.len(),
                band_min: classify_stats.band_min,
                band_max: classify_stats.band_max,
            })?;
        info!(
            "grid {width}x{height}: {} indexed, {} disconnected",
            indexing.indexed, indexing.disconnected
        );

        // 6. Calibrate the index→pixel model.
        let mut estimator = GridEstimator::new(self.params.fit_model);
        for cell in graph.cells() {
            if let (Some(index), Some(centroid)) = (cell.grid_index(), cell.centroid()) {
                estimator.add(index, centroid)?;
            }
        }
        estimator.process()?;

        // 7. Canonicalize appearance and score against the template cell.
        let output_size = ((avg_side * self.params.extract.output_size_factor) as u32).max(1);
        let pad = self.params.extract.match_padding;
        self.extract_all(&mut graph, pre, output_size, pad);

        let slots = build_slots(&graph, width, height);
        let template = self.select_template(&graph, &slots, width, height)?;
        let (scores, max_score) = score_against_template(&graph, &slots, template, width, pad);

        Ok(GridReconstruction {
            width,
            height,
            graph,
            slots,
            scores,
            max_score,
            template,
            disconnected: indexing.disconnected,
            estimator,
            classify_stats,
        })
    }

    /// Extract the canonical image and mask for every indexed cell, and
    /// cache the padded search image so scoring reuses it.
    fn extract_all(&self, graph: &mut CellGraph, pre: &Preprocessed, size: u32, pad: u32) {
        for id in 0..graph.len() {
            let Some(cell) = graph.cell(id) else { continue };
            if cell.grid_index().is_none() {
                continue;
            }
            // Rotation is undefined for isolated cells; extract axis-aligned.
            let rotation = graph.estimate_rotation(id).unwrap_or(0.0);

            let image = graph
                .cell(id)
                .and_then(|c| c.extract_canonical(&pre.denoised, rotation, size));
            let mask = graph
                .cell(id)
                .and_then(|c| c.extract_canonical(&pre.binary, rotation, size));
            if let Some(cell) = graph.cell_mut(id) {
                cell.image = image;
                cell.mask = mask;
                cell.ensure_padded(pad);
            }
        }
        debug!("extracted {size}x{size} canonical rasters");
    }

    /// Pick the template slot: the configured one, or the occupied slot
    /// nearest the grid centre (row-major tie-break).
    fn select_template(
        &self,
        graph: &CellGraph,
        slots: &[Option<usize>],
        width: u32,
        height: u32,
    ) -> Result<GridIndex, GridReadError> {
        if let Some(slot) = self.params.template_slot {
            let occupied = in_bounds(slot, width, height)
                && slot_cell(graph, slots, width, slot).is_some();
            if occupied {
                return Ok(slot);
            }
            log::warn!("configured template slot {slot} is empty, picking nearest to centre");
        }

        let cx = (width as f64 - 1.0) * 0.5;
        let cy = (height as f64 - 1.0) * 0.5;
        let mut best: Option<(f64, GridIndex)> = None;
        for y in 0..height {
            for x in 0..width {
                if slots[(y * width + x) as usize].is_none() {
                    continue;
                }
                let d = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, GridIndex::new(x as i32, y as i32)));
                }
            }
        }
        best.map(|(_, gi)| gi)
            .ok_or(GridReadError::EmptyCandidateSet {
                candidates: 0,
                band_min: 0.0,
                band_max: 0.0,
            })
    }
}

/// Row-major occupancy map from indexed cells.
fn build_slots(graph: &CellGraph, width: u32, height: u32) -> Vec<Option<usize>> {
    let mut slots = vec![None; (width * height) as usize];
    for (id, cell) in graph.cells().iter().enumerate() {
        if let Some(gi) = cell.grid_index() {
            if gi.x >= 0 && gi.y >= 0 && (gi.x as u32) < width && (gi.y as u32) < height {
                slots[(gi.y as u32 * width + gi.x as u32) as usize] = Some(id);
            }
        }
    }
    slots
}

fn in_bounds(slot: GridIndex, width: u32, height: u32) -> bool {
    slot.x >= 0 && slot.y >= 0 && (slot.x as u32) < width && (slot.y as u32) < height
}

fn slot_cell<'g>(
    graph: &'g CellGraph,
    slots: &[Option<usize>],
    width: u32,
    slot: GridIndex,
) -> Option<&'g crate::cell::Cell> {
    let id = slots[(slot.y as u32 * width + slot.x as u32) as usize]?;
    graph.cell(id)
}

/// Score every occupied slot against the template cell; returns the scores
/// in row-major slot order plus the maximum.
fn score_against_template(
    graph: &CellGraph,
    slots: &[Option<usize>],
    template: GridIndex,
    width: u32,
    pad: u32,
) -> (Vec<CellScore>, f32) {
    let Some(template_cell) = slot_cell(graph, slots, width, template) else {
        return (Vec::new(), 0.0);
    };

    let mut scores = Vec::new();
    let mut max_score = 0.0f32;
    for (slot, id) in slots.iter().enumerate() {
        let Some(id) = id else { continue };
        let Some(cell) = graph.cell(*id) else { continue };
        let Some(score) = cell.match_score(template_cell, pad) else {
            continue;
        };
        let index = GridIndex::new((slot as u32 % width) as i32, (slot as u32 / width) as i32);
        scores.push(CellScore { index, score });
        max_score = max_score.max(score);
    }
    info!(
        "scored {} cells against template {template}, max dissimilarity {max_score:.4}",
        scores.len()
    );
    (scores, max_score)
}

/// Trace closed contours in the binarized image as polygon point lists.
fn trace_contours(binary: &GrayImage) -> Vec<Vec<Point2<f64>>> {
    imageproc::contours::find_contours::<i32>(binary)
        .into_iter()
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect()
        })
        .collect()
}
