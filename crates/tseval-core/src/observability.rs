// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EvalError;

/// One labelled cloud of 2-D points, ready for a scatter plot.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedSet {
    pub label: String,
    pub points: Vec<[f64; 2]>,
}

/// Best-effort telemetry sink for scalar scores and embedding projections.
///
/// Implementations own their transport (a metrics service, an image logger,
/// a file). Callers treat every method as fire-and-forget: a returned error
/// is logged and swallowed, never propagated into scoring.
pub trait TelemetrySink {
    fn record_scalar(&self, key: &str, value: f64) -> Result<(), EvalError>;
    fn record_projection(&self, key: &str, sets: &[ProjectedSet]) -> Result<(), EvalError>;
}

/// No-op sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record_scalar(&self, _key: &str, _value: f64) -> Result<(), EvalError> {
        Ok(())
    }

    fn record_projection(&self, _key: &str, _sets: &[ProjectedSet]) -> Result<(), EvalError> {
        Ok(())
    }
}
