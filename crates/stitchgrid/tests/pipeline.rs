//! End-to-end scenario over the geometry stages: a synthetic 3×3 lattice of
//! identical squares through classify → link → index → normalize, plus the
//! calibration fit on top.

use log::LevelFilter;
use nalgebra::Point2;
use stitchgrid::{
    classify, link_cells, CellGraph, ClassifyParams, Direction, FitModel, GridEstimator,
    GridIndex, LinkParams,
};
use stitchgrid_core::logger;

fn init_logging() {
    logger::init_with_level(LevelFilter::Debug);
}

fn square_at(cx: f64, cy: f64, side: f64) -> Vec<Point2<f64>> {
    let h = side * 0.5;
    vec![
        Point2::new(cx - h, cy - h),
        Point2::new(cx + h, cy - h),
        Point2::new(cx + h, cy + h),
        Point2::new(cx - h, cy + h),
    ]
}

/// 3×3 lattice of identical 10px squares on a 12px pitch, with small and
/// large clutter shapes around it.
fn synthetic_contours() -> Vec<Vec<Point2<f64>>> {
    let mut contours = Vec::new();
    for y in 0..3 {
        for x in 0..3 {
            contours.push(square_at(
                50.0 + x as f64 * 12.0,
                50.0 + y as f64 * 12.0,
                10.0,
            ));
        }
    }
    // Noise specks and one merged region.
    contours.push(square_at(5.0, 5.0, 1.0));
    contours.push(square_at(8.0, 5.0, 1.0));
    contours.push(square_at(120.0, 120.0, 60.0));
    contours
}

#[test]
fn three_by_three_lattice_reconstructs_exactly() {
    init_logging();
    let classified = classify(synthetic_contours(), &ClassifyParams::default()).unwrap();
    assert_eq!(classified.cells.len(), 9);
    assert!((classified.avg_side - 10.0).abs() < 1e-9);

    let mut graph = CellGraph::new(classified.cells);
    link_cells(&mut graph, classified.avg_side, &LinkParams::default()).unwrap();

    let stats = graph.assign_indices(0).unwrap();
    assert_eq!(stats.indexed, 9);
    assert_eq!(stats.disconnected, 0);

    let (width, height) = graph.normalize_indices().unwrap();
    assert_eq!((width, height), (3, 3));

    // Indices span (0,0)..(2,2) with no duplicates.
    let mut seen: Vec<GridIndex> = graph
        .cells()
        .iter()
        .map(|c| c.grid_index().unwrap())
        .collect();
    seen.sort_by_key(|gi| (gi.y, gi.x));
    let expected: Vec<GridIndex> = (0..3)
        .flat_map(|y| (0..3).map(move |x| GridIndex::new(x, y)))
        .collect();
    assert_eq!(seen, expected);

    // Interior cell has 4 neighbours, corners exactly 2, edges 3.
    for (id, cell) in graph.cells().iter().enumerate() {
        let gi = cell.grid_index().unwrap();
        let on_edge_x = gi.x == 0 || gi.x == 2;
        let on_edge_y = gi.y == 0 || gi.y == 2;
        let expected = match (on_edge_x, on_edge_y) {
            (true, true) => 2,
            (false, false) => 4,
            _ => 3,
        };
        assert_eq!(
            cell.neighbour_count(),
            expected,
            "cell {id} at {gi} has wrong degree"
        );
    }

    // Linked neighbours respect index offsets.
    for cell in graph.cells() {
        let gi = cell.grid_index().unwrap();
        for dir in Direction::ALL {
            if let Some(n) = cell.neighbour(dir) {
                let (dx, dy) = dir.offset();
                assert_eq!(graph.cell(n).unwrap().grid_index().unwrap(), gi.offset(dx, dy));
            }
        }
    }

    // Calibration round-trips the lattice positions.
    let mut estimator = GridEstimator::new(FitModel::Similarity);
    for cell in graph.cells() {
        estimator
            .add(cell.grid_index().unwrap(), cell.centroid().unwrap())
            .unwrap();
    }
    estimator.process().unwrap();
    for cell in graph.cells() {
        let gi = cell.grid_index().unwrap();
        let predicted = estimator.evaluate(gi.x as f64, gi.y as f64).unwrap();
        let actual = cell.centroid().unwrap();
        assert!((predicted - actual).norm() < 1e-6);
    }
}

#[test]
fn logger_installs_once_and_stays_installed() {
    assert!(logger::init_with_level(LevelFilter::Debug));
    // Repeat installs (other tests, other levels) are no-ops.
    assert!(logger::init_with_level(LevelFilter::Trace));
    log::info!("logger smoke line");
}

#[test]
fn seed_choice_does_not_change_the_normalized_grid() {
    init_logging();
    for seed in [0usize, 4, 8] {
        let classified = classify(synthetic_contours(), &ClassifyParams::default()).unwrap();
        let mut graph = CellGraph::new(classified.cells);
        link_cells(&mut graph, classified.avg_side, &LinkParams::default()).unwrap();
        graph.assign_indices(seed).unwrap();
        let (width, height) = graph.normalize_indices().unwrap();
        assert_eq!((width, height), (3, 3), "seed {seed}");

        let indexed: Vec<GridIndex> = graph
            .cells()
            .iter()
            .filter_map(|c| c.grid_index())
            .collect();
        assert_eq!(indexed.iter().map(|gi| gi.x).min(), Some(0));
        assert_eq!(indexed.iter().map(|gi| gi.y).min(), Some(0));
    }
}
