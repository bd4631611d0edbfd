// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod error;
pub mod features;
pub mod observability;
pub mod series;

pub use batch::{run_batched, Stack};
pub use config::{EvaluationConfig, ExtractorKind, RefinementConfig};
pub use error::EvalError;
pub use features::{ClassProbabilities, FeatureMatrix};
pub use observability::{NullTelemetry, ProjectedSet, TelemetrySink};
pub use series::TimeSeriesBatch;
