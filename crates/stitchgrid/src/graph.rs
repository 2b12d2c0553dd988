//! Arena of cells plus the neighbour-graph operations: symmetric linking,
//! breadth-first grid-index propagation, index normalization and the
//! neighbour-based geometry estimates.

use std::collections::VecDeque;

use log::warn;
use nalgebra::{Point2, Vector2};
use stitchgrid_core::GridIndex;

use crate::cell::{Cell, Direction};
use crate::error::GridReadError;

/// Outcome of the BFS indexing pass.
#[derive(Clone, Copy, Debug)]
pub struct IndexingStats {
    /// Cells reached from the seed and assigned an index.
    pub indexed: usize,
    /// Cells in other connected components, excluded from the grid.
    pub disconnected: usize,
}

/// Owns every cell of one pipeline run and mediates all operations that
/// touch more than one cell, so the link-symmetry and set-once-index
/// invariants live in one place.
#[derive(Clone, Debug, Default)]
pub struct CellGraph {
    cells: Vec<Cell>,
}

impl CellGraph {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: usize) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cell_mut(&mut self, id: usize) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    /// Link `a` and `b` as neighbours: `a`'s `direction` slot points at `b`
    /// and `b`'s opposite slot points back at `a`.
    ///
    /// Re-linking an existing pair is a no-op; a slot already holding a
    /// *different* cell is an [`GridReadError::InconsistentLink`] invariant
    /// violation.
    pub fn link(&mut self, a: usize, b: usize, direction: Direction) -> Result<(), GridReadError> {
        // Validate both ids before touching either slot.
        for id in [a, b] {
            if id >= self.cells.len() {
                return Err(GridReadError::UnknownCell { cell: id });
            }
        }
        self.set_neighbour(a, direction, b)?;
        self.set_neighbour(b, direction.opposite(), a)
    }

    fn set_neighbour(
        &mut self,
        cell: usize,
        direction: Direction,
        target: usize,
    ) -> Result<(), GridReadError> {
        let slot = &mut self
            .cells
            .get_mut(cell)
            .ok_or(GridReadError::UnknownCell { cell })?
            .neighbours[direction.slot()];
        match *slot {
            None => {
                *slot = Some(target);
                Ok(())
            }
            Some(existing) if existing == target => Ok(()),
            Some(_) => Err(GridReadError::InconsistentLink { cell, direction }),
        }
    }

    /// Assign `id`'s grid index; a conflicting existing value is an
    /// [`GridReadError::InconsistentIndex`] invariant violation.
    pub fn set_grid_index(&mut self, id: usize, index: GridIndex) -> Result<(), GridReadError> {
        self.cells
            .get_mut(id)
            .ok_or(GridReadError::UnknownCell { cell: id })?
            .assign_index(index)
            .map_err(|existing| GridReadError::InconsistentIndex {
                cell: id,
                existing,
                attempted: index,
            })
    }

    /// Propagate `id`'s index to each linked neighbour as
    /// `index + unit offset`, skipping neighbours that already carry the
    /// (matching) value.
    pub fn propagate_index(&mut self, id: usize) -> Result<(), GridReadError> {
        let cell = self
            .cells
            .get(id)
            .ok_or(GridReadError::UnknownCell { cell: id })?;
        let Some(index) = cell.grid_index() else {
            return Ok(());
        };
        let neighbours = cell.neighbours;
        for direction in Direction::ALL {
            if let Some(neighbour) = neighbours[direction.slot()] {
                let (dx, dy) = direction.offset();
                self.set_grid_index(neighbour, index.offset(dx, dy))?;
            }
        }
        Ok(())
    }

    /// Breadth-first index propagation from `seed` at (0,0).
    ///
    /// Strictly queue-ordered: propagation order decides which cell labels an
    /// ambiguous neighbour first, so this must stay sequential. Cells
    /// unreachable from the seed stay unindexed and are only counted.
    pub fn assign_indices(&mut self, seed: usize) -> Result<IndexingStats, GridReadError> {
        self.set_grid_index(seed, GridIndex::new(0, 0))?;

        let mut queue = VecDeque::new();
        queue.push_back(seed);
        let mut indexed = 0usize;
        let mut visited = vec![false; self.cells.len()];

        while let Some(id) = queue.pop_front() {
            if visited[id] {
                continue;
            }
            visited[id] = true;
            indexed += 1;

            for direction in Direction::ALL {
                if let Some(neighbour) = self.cells[id].neighbour(direction) {
                    if self.cells[neighbour].grid_index().is_none() {
                        queue.push_back(neighbour);
                    }
                }
            }
            self.propagate_index(id)?;
        }

        let disconnected = self.cells.len() - indexed;
        if disconnected > 0 {
            warn!(
                "{disconnected} cell(s) unreachable from BFS seed, excluded from grid"
            );
        }
        Ok(IndexingStats {
            indexed,
            disconnected,
        })
    }

    /// Shift every index so the minimum becomes (0,0); returns the grid
    /// dimensions `(width, height) = max index + 1`, or `None` when no cell
    /// is indexed.
    pub fn normalize_indices(&mut self) -> Option<(u32, u32)> {
        let indexed = self.cells.iter().filter_map(|c| c.grid_index());
        let (min_x, min_y) = indexed.clone().fold((i32::MAX, i32::MAX), |(x, y), gi| {
            (x.min(gi.x), y.min(gi.y))
        });
        if min_x == i32::MAX {
            return None;
        }

        for cell in &mut self.cells {
            cell.shift_index(-min_x, -min_y);
        }

        let (max_x, max_y) = self
            .cells
            .iter()
            .filter_map(|c| c.grid_index())
            .fold((0i32, 0i32), |(x, y), gi| (x.max(gi.x), y.max(gi.y)));
        Some((max_x as u32 + 1, max_y as u32 + 1))
    }

    /// Local grid rotation at `id`: the circular mean of each present
    /// neighbour's displacement angle minus the ideal lattice angle for that
    /// direction.
    ///
    /// `None` when the cell has no neighbours (the rotation is undefined, not
    /// zero).
    pub fn estimate_rotation(&self, id: usize) -> Option<f64> {
        let cell = self.cells.get(id)?;
        let mut sum = Vector2::<f64>::zeros();
        let mut any = false;

        for direction in Direction::ALL {
            let Some(neighbour) = cell.neighbour(direction) else {
                continue;
            };
            let Some(target) = self.cells[neighbour].centroid() else {
                continue;
            };
            let d = cell.displacement_to(target)?;
            let residual = d.y.atan2(d.x) - direction.lattice_angle();
            sum += Vector2::new(residual.cos(), residual.sin());
            any = true;
        }

        any.then(|| sum.y.atan2(sum.x))
    }

    /// Recover an unreliable cell's centroid and nominal size from its
    /// surroundings: for every direction with both a first- and second-order
    /// neighbour, extrapolate a candidate center `2·first − second`; with at
    /// least three candidates, average them and the immediate neighbours'
    /// side lengths.
    ///
    /// Returns `false` (leaving the cell untouched) when fewer than three
    /// candidates exist.
    pub fn estimate_from_neighbours(&mut self, id: usize) -> bool {
        let Some(start) = self.cells.get(id) else {
            return false;
        };
        let neighbours = start.neighbours;

        let mut candidates: Vec<Point2<f64>> = Vec::new();
        let mut neighbour_sides: Vec<f64> = Vec::new();

        for direction in Direction::ALL {
            let Some(first) = neighbours[direction.slot()] else {
                continue;
            };
            neighbour_sides.push(self.cells[first].side_length());

            let Some(second) = self.cells[first].neighbour(direction) else {
                continue;
            };
            let (Some(a), Some(b)) = (self.cells[first].centroid(), self.cells[second].centroid())
            else {
                continue;
            };
            candidates.push(Point2::new(2.0 * a.x - b.x, 2.0 * a.y - b.y));
        }

        if candidates.len() < 3 {
            return false;
        }

        let n = candidates.len() as f64;
        let sum = candidates
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        let side = neighbour_sides.iter().sum::<f64>() / neighbour_sides.len() as f64;

        let cell = &mut self.cells[id];
        cell.set_centroid(Point2::from(sum / n));
        cell.set_side_length(side);
        true
    }
}
