// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::batch::Stack;
use crate::EvalError;
use std::ops::Range;

/// Owned batch of fixed-length time series, shape `(batch, channels, length)`
/// in C-contiguous order. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesBatch {
    values: Vec<f64>,
    n: usize,
    channels: usize,
    len: usize,
}

impl TimeSeriesBatch {
    /// Constructs a validated batch from a flat `(batch, channels, length)`
    /// buffer.
    pub fn new(
        values: Vec<f64>,
        n: usize,
        channels: usize,
        len: usize,
    ) -> Result<Self, EvalError> {
        if n == 0 {
            return Err(EvalError::invalid_input("batch size must be >= 1"));
        }
        if channels == 0 {
            return Err(EvalError::invalid_input("channel count must be >= 1"));
        }
        if len == 0 {
            return Err(EvalError::invalid_input("series length must be >= 1"));
        }

        let expected_len = n
            .checked_mul(channels)
            .and_then(|value| value.checked_mul(len))
            .ok_or_else(|| {
                EvalError::invalid_input("n*channels*len overflow while validating shape")
            })?;
        if values.len() != expected_len {
            return Err(EvalError::invalid_input(format!(
                "value length mismatch: got {}, expected {} (n={n}, channels={channels}, len={len})",
                values.len(),
                expected_len
            )));
        }

        Ok(Self {
            values,
            n,
            channels,
            len,
        })
    }

    /// Builds a univariate batch from per-series rows of equal length.
    pub fn from_univariate_rows(rows: Vec<Vec<f64>>) -> Result<Self, EvalError> {
        let n = rows.len();
        if n == 0 {
            return Err(EvalError::invalid_input("batch size must be >= 1"));
        }
        let len = rows[0].len();
        let mut values = Vec::with_capacity(n * len);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != len {
                return Err(EvalError::invalid_input(format!(
                    "series length mismatch: series {index} has {}, expected {len}",
                    row.len()
                )));
            }
            values.extend(row);
        }
        Self::new(values, n, 1, len)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn series_len(&self) -> usize {
        self.len
    }

    pub fn is_univariate(&self) -> bool {
        self.channels == 1
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// All channels of series `i` as one contiguous `(channels * length)`
    /// slice.
    pub fn series(&self, i: usize) -> &[f64] {
        let stride = self.channels * self.len;
        &self.values[i * stride..(i + 1) * stride]
    }

    /// Single channel of series `i`.
    pub fn channel(&self, i: usize, channel: usize) -> &[f64] {
        let start = (i * self.channels + channel) * self.len;
        &self.values[start..start + self.len]
    }

    /// Copies out the contiguous sub-batch covering `range` of the sample
    /// axis.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, EvalError> {
        if range.start >= range.end || range.end > self.n {
            return Err(EvalError::invalid_input(format!(
                "slice range {}..{} out of bounds for batch of {} series",
                range.start, range.end, self.n
            )));
        }
        let stride = self.channels * self.len;
        let values = self.values[range.start * stride..range.end * stride].to_vec();
        Self::new(values, range.end - range.start, self.channels, self.len)
    }

    /// Concatenates batches along the sample axis, preserving order.
    /// All parts must agree on channel count and series length.
    pub fn concat(parts: Vec<Self>) -> Result<Self, EvalError> {
        let Some(first) = parts.first() else {
            return Err(EvalError::invalid_input(
                "cannot concatenate zero batches",
            ));
        };
        let channels = first.channels;
        let len = first.len;

        let mut n = 0usize;
        let mut values = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.channels != channels || part.len != len {
                return Err(EvalError::invalid_input(format!(
                    "batch {index} shape mismatch: got (channels={}, len={}), expected (channels={channels}, len={len})",
                    part.channels, part.len
                )));
            }
            n += part.n;
            values.extend_from_slice(&part.values);
        }
        Self::new(values, n, channels, len)
    }
}

impl Stack for TimeSeriesBatch {
    fn stack(parts: Vec<Self>) -> Result<Self, EvalError> {
        Self::concat(parts)
    }
}
