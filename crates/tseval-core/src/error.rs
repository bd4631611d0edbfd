// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error;

/// Workspace-wide error taxonomy.
///
/// Configuration and checkpoint failures are fatal at construction;
/// `InsufficientData` is fatal only for the single score computation that
/// raised it. No variant is ever retried: every operation is deterministic
/// given fixed inputs.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing checkpoint for dataset `{dataset}`: {}", .path.display())]
    MissingCheckpoint { dataset: String, path: PathBuf },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("batch {index} failed: {source}")]
    BatchFailed {
        index: usize,
        #[source]
        source: Box<EvalError>,
    },

    #[error("corrupt artifact: {0}")]
    Corrupt(String),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn missing_checkpoint(dataset: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingCheckpoint {
            dataset: dataset.into(),
            path: path.into(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn batch_failed(index: usize, source: EvalError) -> Self {
        Self::BatchFailed {
            index,
            source: Box::new(source),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the per-metric failure a session run may skip
    /// instead of aborting.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData(_))
    }
}
