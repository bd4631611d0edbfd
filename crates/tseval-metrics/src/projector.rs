// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::frechet::{gaussian_moments, MIN_ROWS_FOR_COVARIANCE};
use crate::outliers::remove_outliers;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tseval_core::{EvalError, FeatureMatrix};

/// Axis limits of the fitted training projection, cached at fit time so
/// later plots share one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Two-component PCA projection, fitted once on outlier-filtered reference
/// features and read-only afterwards.
///
/// Eigenvector signs are normalized (largest-magnitude loading positive),
/// so fitting the same data always yields the same projection.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedProjector {
    mean: DVector<f64>,
    /// `(dim, 2)` projection matrix; columns are the top two principal
    /// directions.
    components: DMatrix<f64>,
    bounds: AxisBounds,
}

impl FittedProjector {
    /// Fits the projector. Rows with non-finite values are dropped first;
    /// at least two rows must survive and the feature dimension must be at
    /// least two.
    pub fn fit(features: &FeatureMatrix) -> Result<Self, EvalError> {
        let filtered = remove_outliers(features);
        if filtered.rows() < MIN_ROWS_FOR_COVARIANCE {
            return Err(EvalError::insufficient_data(format!(
                "projector fit has {} finite rows after outlier removal; needs {MIN_ROWS_FOR_COVARIANCE}",
                filtered.rows()
            )));
        }
        if filtered.dim() < 2 {
            return Err(EvalError::invalid_input(format!(
                "2-D projection needs feature dimension >= 2; got {}",
                filtered.dim()
            )));
        }

        let (mean, covariance) = gaussian_moments(&filtered);
        let dim = filtered.dim();

        let eigen = SymmetricEigen::new(covariance);
        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&left, &right| {
            eigen.eigenvalues[right].total_cmp(&eigen.eigenvalues[left])
        });

        let mut components = DMatrix::zeros(dim, 2);
        for (column, &source) in order.iter().take(2).enumerate() {
            let mut direction: DVector<f64> = eigen.eigenvectors.column(source).clone_owned();
            let dominant = direction
                .iter()
                .copied()
                .fold(0.0_f64, |acc, value| if value.abs() > acc.abs() { value } else { acc });
            if dominant < 0.0 {
                direction = -direction;
            }
            components.set_column(column, &direction);
        }

        let mut projector = Self {
            mean,
            components,
            bounds: AxisBounds {
                x_min: 0.0,
                x_max: 0.0,
                y_min: 0.0,
                y_max: 0.0,
            },
        };

        let train_points = projector.project(&filtered)?;
        let mut bounds = AxisBounds {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for [x, y] in &train_points {
            bounds.x_min = bounds.x_min.min(*x);
            bounds.x_max = bounds.x_max.max(*x);
            bounds.y_min = bounds.y_min.min(*y);
            bounds.y_max = bounds.y_max.max(*y);
        }
        projector.bounds = bounds;
        Ok(projector)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn bounds(&self) -> AxisBounds {
        self.bounds
    }

    /// Projects each row onto the two fitted components. Rows are used
    /// as-is; callers filter non-finite rows when that matters.
    pub fn project(&self, features: &FeatureMatrix) -> Result<Vec<[f64; 2]>, EvalError> {
        if features.dim() != self.dim() {
            return Err(EvalError::invalid_input(format!(
                "feature dimension mismatch: projector was fitted on {}, got {}",
                self.dim(),
                features.dim()
            )));
        }

        let mut points = Vec::with_capacity(features.rows());
        for row in features.iter_rows() {
            let mut x = 0.0;
            let mut y = 0.0;
            for (j, &value) in row.iter().enumerate() {
                let centered = value - self.mean[j];
                x += centered * self.components[(j, 0)];
                y += centered * self.components[(j, 1)];
            }
            points.push([x, y]);
        }
        Ok(points)
    }
}
