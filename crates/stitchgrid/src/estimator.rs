//! Least-squares model from integer grid index to pixel position.
//!
//! Fed with every indexed cell's (index, centroid) pair, the fitted model
//! answers pixel-position queries for arbitrary fractional grid coordinates;
//! callers use it for overlay rendering and for recovering the expected
//! positions of empty slots.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, Point2};
use serde::{Deserialize, Serialize};
use stitchgrid_core::GridIndex;

use crate::error::GridReadError;

/// Coordinate model shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum FitModel {
    /// Rotation + uniform scale + translation:
    /// `x = a·Xi + b·Yi + c`, `y = −b·Xi + a·Yi + d`.
    /// The right choice when the photographed grid is rigid.
    #[default]
    Similarity,
    /// Full 6-parameter affine map; admits shear and anisotropic scale.
    Affine,
}

impl FitModel {
    fn parameter_count(self) -> usize {
        match self {
            FitModel::Similarity => 4,
            FitModel::Affine => 6,
        }
    }
}

/// Minimum distinct observations for a meaningful fit.
const MIN_OBSERVATIONS: usize = 4;

/// Accumulates (grid index, pixel position) observations and fits the
/// selected model. Coefficients are immutable once computed; a re-fit
/// replaces them wholesale.
#[derive(Clone, Debug, Default)]
pub struct GridEstimator {
    model: FitModel,
    observations: HashMap<GridIndex, Point2<f64>>,
    coefficients: Option<DVector<f64>>,
}

impl GridEstimator {
    pub fn new(model: FitModel) -> Self {
        Self {
            model,
            observations: HashMap::new(),
            coefficients: None,
        }
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Record one observation. Each grid index may appear at most once.
    pub fn add(&mut self, index: GridIndex, pixel: Point2<f64>) -> Result<(), GridReadError> {
        if self.observations.contains_key(&index) {
            return Err(GridReadError::DuplicateObservation { index });
        }
        self.observations.insert(index, pixel);
        Ok(())
    }

    /// Solve the least-squares fit over all observations.
    ///
    /// Each observation contributes one equation per pixel component. Fails
    /// with [`GridReadError::InsufficientObservations`] when fewer than
    /// [`MIN_OBSERVATIONS`] points were added or when the observation layout
    /// is degenerate (e.g. all indices collinear), which leaves the system
    /// rank-deficient.
    pub fn process(&mut self) -> Result<(), GridReadError> {
        let n = self.observations.len();
        if n < MIN_OBSERVATIONS {
            return Err(GridReadError::InsufficientObservations {
                got: n,
                need: MIN_OBSERVATIONS,
            });
        }

        let params = self.model.parameter_count();
        let mut design = DMatrix::<f64>::zeros(2 * n, params);
        let mut rhs = DVector::<f64>::zeros(2 * n);

        for (row, (index, pixel)) in self.observations.iter().enumerate() {
            let (xi, yi) = (index.x as f64, index.y as f64);
            let r = 2 * row;
            rhs[r] = pixel.x;
            rhs[r + 1] = pixel.y;
            match self.model {
                FitModel::Similarity => {
                    design[(r, 0)] = xi;
                    design[(r, 1)] = yi;
                    design[(r, 2)] = 1.0;
                    design[(r + 1, 0)] = yi;
                    design[(r + 1, 1)] = -xi;
                    design[(r + 1, 3)] = 1.0;
                }
                FitModel::Affine => {
                    design[(r, 0)] = xi;
                    design[(r, 1)] = yi;
                    design[(r, 2)] = 1.0;
                    design[(r + 1, 3)] = xi;
                    design[(r + 1, 4)] = yi;
                    design[(r + 1, 5)] = 1.0;
                }
            }
        }

        let svd = design.svd(true, true);
        if svd.rank(1e-9) < params {
            return Err(GridReadError::InsufficientObservations {
                got: n,
                need: MIN_OBSERVATIONS,
            });
        }
        let solution = svd
            .solve(&rhs, 1e-12)
            .map_err(|_| GridReadError::InsufficientObservations {
                got: n,
                need: MIN_OBSERVATIONS,
            })?;
        self.coefficients = Some(solution);
        Ok(())
    }

    /// Fitted pixel position for a (possibly fractional) grid coordinate.
    pub fn evaluate(&self, xi: f64, yi: f64) -> Result<Point2<f64>, GridReadError> {
        let c = self.coefficients.as_ref().ok_or(GridReadError::UnfittedQuery)?;
        let p = match self.model {
            FitModel::Similarity => Point2::new(
                c[0] * xi + c[1] * yi + c[2],
                -c[1] * xi + c[0] * yi + c[3],
            ),
            FitModel::Affine => Point2::new(
                c[0] * xi + c[1] * yi + c[2],
                c[3] * xi + c[4] * yi + c[5],
            ),
        };
        Ok(p)
    }

    /// Nearest integer pixel coordinate for a grid coordinate.
    pub fn evaluate_rounded(&self, xi: f64, yi: f64) -> Result<(i32, i32), GridReadError> {
        let p = self.evaluate(xi, yi)?;
        Ok((p.x.round() as i32, p.y.round() as i32))
    }
}
