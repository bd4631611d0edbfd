// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::outliers::remove_outliers;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tseval_core::{EvalError, FeatureMatrix};

/// Covariance needs at least two rows.
pub(crate) const MIN_ROWS_FOR_COVARIANCE: usize = 2;

/// Gaussian summary of a feature set: mean vector and sample covariance
/// (n−1 denominator).
pub(crate) fn gaussian_moments(features: &FeatureMatrix) -> (DVector<f64>, DMatrix<f64>) {
    let rows = features.rows();
    let dim = features.dim();

    let mut mean = DVector::zeros(dim);
    for row in features.iter_rows() {
        for (j, &value) in row.iter().enumerate() {
            mean[j] += value;
        }
    }
    mean /= rows as f64;

    let mut centered = DMatrix::zeros(rows, dim);
    for (i, row) in features.iter_rows().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            centered[(i, j)] = value - mean[j];
        }
    }
    let covariance = centered.transpose() * &centered / (rows as f64 - 1.0);
    (mean, covariance)
}

/// Principal square root of a symmetric positive-semidefinite matrix via
/// eigendecomposition, with eigenvalues clamped at zero against numerical
/// noise.
fn sqrt_psd(matrix: DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(matrix);
    let sqrt_values = eigen.eigenvalues.map(|value| value.max(0.0).sqrt());
    &eigen.eigenvectors
        * DMatrix::from_diagonal(&sqrt_values)
        * eigen.eigenvectors.transpose()
}

/// Closed-form Fréchet distance between the Gaussian approximations of two
/// feature sets:
///
/// `‖μa − μb‖² + tr(Σa + Σb − 2·(Σa·Σb)^{1/2})`
///
/// Both sets are outlier-filtered independently before the moments are
/// estimated; each must keep at least two finite rows. The cross trace is
/// computed as `tr((√Σa · Σb · √Σa)^{1/2})`, which equals the textbook
/// form for positive-semidefinite inputs and stays in symmetric-eigen
/// territory.
pub fn frechet_distance(a: &FeatureMatrix, b: &FeatureMatrix) -> Result<f64, EvalError> {
    if a.dim() != b.dim() {
        return Err(EvalError::invalid_input(format!(
            "feature dimension mismatch: {} vs {}",
            a.dim(),
            b.dim()
        )));
    }

    let a = remove_outliers(a);
    let b = remove_outliers(b);
    if a.rows() < MIN_ROWS_FOR_COVARIANCE {
        return Err(EvalError::insufficient_data(format!(
            "first feature set has {} finite rows after outlier removal; covariance needs {MIN_ROWS_FOR_COVARIANCE}",
            a.rows()
        )));
    }
    if b.rows() < MIN_ROWS_FOR_COVARIANCE {
        return Err(EvalError::insufficient_data(format!(
            "second feature set has {} finite rows after outlier removal; covariance needs {MIN_ROWS_FOR_COVARIANCE}",
            b.rows()
        )));
    }

    let (mean_a, cov_a) = gaussian_moments(&a);
    let (mean_b, cov_b) = gaussian_moments(&b);

    let mean_term = (mean_a - mean_b).norm_squared();

    let sqrt_a = sqrt_psd(cov_a.clone());
    let inner = &sqrt_a * &cov_b * &sqrt_a;
    // Symmetrize before the eigendecomposition; the product accumulates
    // asymmetric rounding error.
    let inner = (&inner + inner.transpose()) * 0.5;
    let cross_trace: f64 = SymmetricEigen::new(inner)
        .eigenvalues
        .iter()
        .map(|&value| value.max(0.0).sqrt())
        .sum();

    let distance = mean_term + cov_a.trace() + cov_b.trace() - 2.0 * cross_trace;
    Ok(distance.max(0.0))
}
