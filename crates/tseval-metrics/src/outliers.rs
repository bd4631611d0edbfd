// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use tseval_core::FeatureMatrix;

/// Drops every row that contains a non-finite value in any dimension.
///
/// Surviving rows are a subset of the input rows in original relative
/// order; the operation is idempotent. Extractors can emit the occasional
/// NaN or infinity on numerically degenerate inputs, so this runs both
/// before projector fitting and inside every distance computation.
pub fn remove_outliers(features: &FeatureMatrix) -> FeatureMatrix {
    let dim = features.dim();
    let mut values = Vec::with_capacity(features.values().len());
    let mut rows = 0usize;
    for row in features.iter_rows() {
        if row.iter().all(|value| value.is_finite()) {
            values.extend_from_slice(row);
            rows += 1;
        }
    }
    FeatureMatrix::new(values, rows, dim)
        .expect("filtered rows keep the validated input shape")
}
