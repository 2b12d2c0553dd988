//! Neighbour linking by centroid proximity and dominant displacement axis
//! (pipeline step 3).

use kiddo::{KdTree, SquaredEuclidean};
use log::info;

use crate::cell::Direction;
use crate::error::GridReadError;
use crate::graph::CellGraph;
use crate::params::LinkParams;

/// Link every pair of cells whose squared centroid distance is below
/// `proximity_multiplier × avg_side²`.
///
/// The displacement is classified as horizontal or vertical by the dominant
/// component, the sign picks Left/Right or Up/Down. On a regular lattice the
/// threshold admits the four axis neighbours and excludes diagonals (at
/// exactly `2 × side²`). Cells without a computed centroid take no part in
/// linking. Returns the number of linked pairs.
pub fn link_cells(
    graph: &mut CellGraph,
    avg_side: f64,
    params: &LinkParams,
) -> Result<usize, GridReadError> {
    // The kd-tree indexes the coords list; ids maps its entries back to
    // graph cell ids, which differ once a cell lacks a centroid.
    let mut ids = Vec::with_capacity(graph.len());
    let mut coords: Vec<[f64; 2]> = Vec::with_capacity(graph.len());
    for (id, cell) in graph.cells().iter().enumerate() {
        if let Some(c) = cell.centroid() {
            ids.push(id);
            coords.push([c.x, c.y]);
        }
    }

    let tree: KdTree<f64, 2> = (&coords).into();
    let max_distance_sq = params.proximity_multiplier * avg_side * avg_side;

    let mut linked = 0usize;
    for (entry, query) in coords.iter().enumerate() {
        let id = ids[entry];
        for hit in tree.within_unsorted::<SquaredEuclidean>(query, max_distance_sq) {
            let other = ids[hit.item as usize];
            if other == id || hit.distance >= max_distance_sq {
                continue;
            }

            let target = coords[hit.item as usize];
            let (dx, dy) = (target[0] - query[0], target[1] - query[1]);
            let direction = if dx.abs() > dy.abs() {
                if dx < 0.0 {
                    Direction::Left
                } else {
                    Direction::Right
                }
            } else if dy < 0.0 {
                Direction::Up
            } else {
                Direction::Down
            };

            // Both orientations of each pair pass through here; the second
            // call is an idempotent no-op.
            if graph.cell(id).and_then(|c| c.neighbour(direction)) != Some(other) {
                linked += 1;
            }
            graph.link(id, other, direction)?;
        }
    }

    info!("linked {linked} neighbour pairs across {} cells", graph.len());
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests::square_at;
    use crate::cell::Cell;
    use crate::graph::tests::lattice;

    #[test]
    fn links_axis_neighbours_not_diagonals() {
        let mut graph = lattice(3, 3, 10.0);
        link_cells(&mut graph, 10.0, &LinkParams::default()).unwrap();

        // Interior cell: all four neighbours.
        let center = graph.cell(4).unwrap();
        assert_eq!(center.neighbour(Direction::Left), Some(3));
        assert_eq!(center.neighbour(Direction::Right), Some(5));
        assert_eq!(center.neighbour(Direction::Up), Some(1));
        assert_eq!(center.neighbour(Direction::Down), Some(7));

        // Corner cells: exactly two.
        for corner in [0usize, 2, 6, 8] {
            assert_eq!(graph.cell(corner).unwrap().neighbour_count(), 2);
        }
        // Edge cells: exactly three.
        for edge in [1usize, 3, 5, 7] {
            assert_eq!(graph.cell(edge).unwrap().neighbour_count(), 3);
        }
    }

    #[test]
    fn distant_cells_are_never_linked() {
        let mut graph = lattice(2, 1, 50.0);
        // avg side far smaller than the 50px spacing.
        link_cells(&mut graph, 10.0, &LinkParams::default()).unwrap();
        assert_eq!(graph.cell(0).unwrap().neighbour_count(), 0);
        assert_eq!(graph.cell(1).unwrap().neighbour_count(), 0);
    }

    #[test]
    fn link_count_reports_unique_pairs() {
        let mut graph = lattice(2, 1, 10.0);
        let linked = link_cells(&mut graph, 10.0, &LinkParams::default()).unwrap();
        assert_eq!(linked, 1);
    }

    #[test]
    fn centroidless_cells_do_not_shift_link_targets() {
        // Row of three cells where the first never got a centroid: it must
        // stay unlinked and the other two must link to each other, not to
        // shifted ids.
        let mut cells = Vec::new();
        cells.push(Cell::new(square_at(20.0, 20.0, 8.0)).unwrap());
        for x in 1..3 {
            let mut cell = Cell::new(square_at(20.0 + x as f64 * 10.0, 20.0, 8.0)).unwrap();
            cell.compute_centroid();
            cells.push(cell);
        }
        let mut graph = CellGraph::new(cells);
        link_cells(&mut graph, 10.0, &LinkParams::default()).unwrap();

        assert_eq!(graph.cell(0).unwrap().neighbour_count(), 0);
        assert_eq!(graph.cell(1).unwrap().neighbour(Direction::Right), Some(2));
        assert_eq!(graph.cell(2).unwrap().neighbour(Direction::Left), Some(1));
    }
}
