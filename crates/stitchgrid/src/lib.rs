//! Turns a photograph of a stitched grid (e.g. a cross-stitch canvas) into a
//! logically indexed 2D grid of cells with canonicalized appearance.
//!
//! Pipeline (strictly sequential stages):
//! 1. Binarize the photograph against a smoothed illumination baseline.
//! 2. Trace closed contours and build candidate cells.
//! 3. Keep the dominant area cluster (local-ratio scan over sorted areas) and
//!    drop non-concentric shapes.
//! 4. Link neighbouring cells by centroid proximity and dominant
//!    displacement axis, up to four directional links per cell.
//! 5. BFS from an arbitrary seed, propagating integer grid indices; shift so
//!    the minimum index is (0,0).
//! 6. Fit a least-squares index→pixel model over every indexed cell.
//! 7. Extract a rotation/position-normalized raster per cell and score each
//!    against a template cell with normalized cross-correlation.
//!
//! Acquisition, file I/O and rendering are the caller's concern; see
//! [`GridReconstruction`] for what a run produces.

pub mod cell;
pub mod classify;
pub mod error;
pub mod estimator;
pub mod graph;
pub mod linking;
pub mod params;
pub mod preprocess;
pub mod reader;
pub mod result;

pub use cell::{Cell, Direction};
pub use classify::{classify, Classified, ClassifyStats};
pub use error::GridReadError;
pub use estimator::{FitModel, GridEstimator};
pub use graph::{CellGraph, IndexingStats};
pub use linking::link_cells;
pub use params::{
    ClassifyParams, ExtractParams, GridReaderParams, LinkParams, PreprocessParams,
};
pub use preprocess::{preprocess, Preprocessed};
pub use reader::GridReader;
pub use result::{CellScore, GridReconstruction, ReconstructionSummary};

pub use stitchgrid_core::GridIndex;
