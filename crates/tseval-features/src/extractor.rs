// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use tseval_core::{EvalError, FeatureMatrix, TimeSeriesBatch};

/// Feature-extraction strategy contract: a batch of raw time series in,
/// one fixed-length feature vector per series out, in input order.
///
/// Implementations must be deterministic: repeated calls on the same batch
/// return identical features, and extraction through any batch-size
/// chunking concatenates to the same matrix as one full-batch call.
pub trait FeatureExtractor {
    /// Dimensionality of every vector `extract` produces.
    fn feature_dim(&self) -> usize;

    fn extract(&self, batch: &TimeSeriesBatch) -> Result<FeatureMatrix, EvalError>;
}
