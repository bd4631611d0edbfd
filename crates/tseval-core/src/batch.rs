// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EvalError;
use std::ops::Range;

/// Output types the batch driver can stitch back together along the sample
/// axis, preserving input order.
pub trait Stack: Sized {
    fn stack(parts: Vec<Self>) -> Result<Self, EvalError>;
}

/// Applies `per_batch` to `ceil(total / batch_size)` contiguous,
/// non-overlapping index ranges covering `0..total` in order, and stitches
/// the per-range outputs.
///
/// The concatenated result is independent of `batch_size` for any pure
/// `per_batch`: batch size affects throughput only, never the output. A
/// failing range aborts the whole run; the error reports the failing batch
/// index and no partial result is returned.
pub fn run_batched<T, F>(total: usize, batch_size: usize, mut per_batch: F) -> Result<T, EvalError>
where
    T: Stack,
    F: FnMut(Range<usize>) -> Result<T, EvalError>,
{
    if total == 0 {
        return Err(EvalError::invalid_input("cannot batch zero samples"));
    }
    if batch_size == 0 {
        return Err(EvalError::invalid_input("batch size must be >= 1"));
    }

    let n_batches = total.div_ceil(batch_size);
    let mut parts = Vec::with_capacity(n_batches);
    for index in 0..n_batches {
        let start = index * batch_size;
        let end = (start + batch_size).min(total);
        let part = per_batch(start..end).map_err(|err| EvalError::batch_failed(index, err))?;
        parts.push(part);
    }
    T::stack(parts)
}
