use crate::cell::Direction;
use stitchgrid_core::GridIndex;

/// Errors surfaced by grid reconstruction.
///
/// `MalformedShape`, `InsufficientObservations`, `EmptyCandidateSet` and
/// `AnchorOutOfRange` are expected-input failures: a bad photograph produces
/// them and callers should report the carried counts/thresholds. The
/// `Inconsistent*` variants are invariant violations in the linking/indexing
/// logic; the pipeline aborts on them rather than emitting a malformed grid.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridReadError {
    #[error("polygon has {vertices} vertices, need at least 3")]
    MalformedShape { vertices: usize },

    #[error("unknown cell id {cell}")]
    UnknownCell { cell: usize },

    #[error("cell {cell} already has a different {direction:?} neighbour")]
    InconsistentLink { cell: usize, direction: Direction },

    #[error("cell {cell} grid index conflict: already {existing}, attempted {attempted}")]
    InconsistentIndex {
        cell: usize,
        existing: GridIndex,
        attempted: GridIndex,
    },

    #[error("coordinate fit needs at least {need} well-spread observations, got {got}")]
    InsufficientObservations { got: usize, need: usize },

    #[error("duplicate observation for grid index {index}")]
    DuplicateObservation { index: GridIndex },

    #[error(
        "no candidate shapes survived classification \
         ({candidates} candidates, area band [{band_min:.1}, {band_max:.1}])"
    )]
    EmptyCandidateSet {
        candidates: usize,
        band_min: f64,
        band_max: f64,
    },

    #[error("area-band anchor {anchor} out of range for {candidates} candidates")]
    AnchorOutOfRange { anchor: usize, candidates: usize },

    #[error("coordinate model queried before a successful fit")]
    UnfittedQuery,
}
