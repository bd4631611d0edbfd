// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::batch::Stack;
use crate::EvalError;

const PROBABILITY_SUM_TOLERANCE: f64 = 1.0e-6;

/// Ordered collection of fixed-length feature vectors, one row per input
/// sample. Row order matches extraction input order.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    rows: usize,
    dim: usize,
}

impl FeatureMatrix {
    /// Constructs a validated `(rows, dim)` matrix from a flat row-major
    /// buffer. `rows == 0` is allowed: outlier filtering may drop every row.
    pub fn new(values: Vec<f64>, rows: usize, dim: usize) -> Result<Self, EvalError> {
        if dim == 0 {
            return Err(EvalError::invalid_input("feature dimension must be >= 1"));
        }
        let expected_len = rows
            .checked_mul(dim)
            .ok_or_else(|| EvalError::invalid_input("rows*dim overflow while validating shape"))?;
        if values.len() != expected_len {
            return Err(EvalError::invalid_input(format!(
                "value length mismatch: got {}, expected {} (rows={rows}, dim={dim})",
                values.len(),
                expected_len
            )));
        }
        Ok(Self { values, rows, dim })
    }

    /// Builds a matrix from per-sample rows, enforcing uniform
    /// dimensionality.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, EvalError> {
        let Some(first) = rows.first() else {
            return Err(EvalError::invalid_input(
                "cannot infer feature dimension from zero rows",
            ));
        };
        let dim = first.len();
        let n_rows = rows.len();
        let mut values = Vec::with_capacity(n_rows * dim);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(EvalError::invalid_input(format!(
                    "feature dimension mismatch: row {index} has {}, expected {dim}",
                    row.len()
                )));
            }
            values.extend(row);
        }
        Self::new(values, n_rows, dim)
    }

    /// Empty matrix with a known dimension; the shape outlier filtering
    /// produces when no row survives.
    pub fn empty(dim: usize) -> Result<Self, EvalError> {
        Self::new(Vec::new(), 0, dim)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dim)
    }

    /// Concatenates matrices along the row axis, preserving order.
    pub fn vstack(parts: Vec<Self>) -> Result<Self, EvalError> {
        let Some(first) = parts.first() else {
            return Err(EvalError::invalid_input("cannot stack zero matrices"));
        };
        let dim = first.dim;

        let mut rows = 0usize;
        let mut values = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.dim != dim {
                return Err(EvalError::invalid_input(format!(
                    "matrix {index} dimension mismatch: got {}, expected {dim}",
                    part.dim
                )));
            }
            rows += part.rows;
            values.extend_from_slice(&part.values);
        }
        Self::new(values, rows, dim)
    }
}

impl Stack for FeatureMatrix {
    fn stack(parts: Vec<Self>) -> Result<Self, EvalError> {
        Self::vstack(parts)
    }
}

/// Per-sample class probability distributions produced by the classifier
/// extractor's softmax head. Each row is non-negative and sums to one.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassProbabilities {
    values: Vec<f64>,
    rows: usize,
    n_classes: usize,
}

impl ClassProbabilities {
    pub fn new(values: Vec<f64>, rows: usize, n_classes: usize) -> Result<Self, EvalError> {
        if n_classes == 0 {
            return Err(EvalError::invalid_input("class count must be >= 1"));
        }
        let expected_len = rows.checked_mul(n_classes).ok_or_else(|| {
            EvalError::invalid_input("rows*n_classes overflow while validating shape")
        })?;
        if values.len() != expected_len {
            return Err(EvalError::invalid_input(format!(
                "value length mismatch: got {}, expected {} (rows={rows}, n_classes={n_classes})",
                values.len(),
                expected_len
            )));
        }

        for (row_index, row) in values.chunks_exact(n_classes).enumerate() {
            let mut sum = 0.0;
            for (class_index, &p) in row.iter().enumerate() {
                if !p.is_finite() || p < 0.0 {
                    return Err(EvalError::invalid_input(format!(
                        "probability must be finite and >= 0; row {row_index}, class {class_index} has {p}"
                    )));
                }
                sum += p;
            }
            if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
                return Err(EvalError::invalid_input(format!(
                    "probability row {row_index} sums to {sum}, expected 1"
                )));
            }
        }

        Ok(Self {
            values,
            rows,
            n_classes,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, EvalError> {
        let Some(first) = rows.first() else {
            return Err(EvalError::invalid_input(
                "cannot infer class count from zero rows",
            ));
        };
        let n_classes = first.len();
        let n_rows = rows.len();
        let mut values = Vec::with_capacity(n_rows * n_classes);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != n_classes {
                return Err(EvalError::invalid_input(format!(
                    "class count mismatch: row {index} has {}, expected {n_classes}",
                    row.len()
                )));
            }
            values.extend(row);
        }
        Self::new(values, n_rows, n_classes)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_classes..(i + 1) * self.n_classes]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n_classes)
    }

    pub fn vstack(parts: Vec<Self>) -> Result<Self, EvalError> {
        let Some(first) = parts.first() else {
            return Err(EvalError::invalid_input(
                "cannot stack zero probability sets",
            ));
        };
        let n_classes = first.n_classes;

        let mut rows = 0usize;
        let mut values = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.n_classes != n_classes {
                return Err(EvalError::invalid_input(format!(
                    "probability set {index} class-count mismatch: got {}, expected {n_classes}",
                    part.n_classes
                )));
            }
            rows += part.rows;
            values.extend_from_slice(&part.values);
        }
        Self::new(values, rows, n_classes)
    }
}

impl Stack for ClassProbabilities {
    fn stack(parts: Vec<Self>) -> Result<Self, EvalError> {
        Self::vstack(parts)
    }
}
