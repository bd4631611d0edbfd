// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EvalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_NUM_KERNELS: usize = 1000;
const DEFAULT_KERNEL_SEED: u64 = 0;
const DEFAULT_REFINEMENT_TAU: f64 = 0.5;
const DEFAULT_CHECKPOINT_DIR: &str = "saved_models";

/// Feature-extraction strategy selector. The on-disk strings match the
/// configuration values the evaluation pipeline has always accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    SupervisedFcn,
    Rocket,
}

/// Hyperparameters for the optional learned refinement module. The fields
/// are carried for the collaborator that owns the module; the session only
/// checks `enabled`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_refinement_tau")]
    pub tau: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tau: DEFAULT_REFINEMENT_TAU,
        }
    }
}

/// Evaluation-run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub feature_extractor: ExtractorKind,
    #[serde(default = "default_num_kernels")]
    pub rocket_num_kernels: usize,
    #[serde(default = "default_kernel_seed")]
    pub rocket_seed: u64,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_num_kernels() -> usize {
    DEFAULT_NUM_KERNELS
}

fn default_kernel_seed() -> u64 {
    DEFAULT_KERNEL_SEED
}

fn default_refinement_tau() -> f64 {
    DEFAULT_REFINEMENT_TAU
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_DIR)
}

impl EvaluationConfig {
    /// Configuration with defaults for everything except the extractor
    /// choice.
    pub fn with_extractor(feature_extractor: ExtractorKind) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            feature_extractor,
            rocket_num_kernels: DEFAULT_NUM_KERNELS,
            rocket_seed: DEFAULT_KERNEL_SEED,
            refinement: RefinementConfig::default(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }

    /// Parses a JSON configuration document. Unknown extractor strings fail
    /// here, before any I/O happens.
    pub fn from_json(raw: &str) -> Result<Self, EvalError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| EvalError::invalid_config(format!("config parse failed: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges. Called at session construction before any
    /// checkpoint or corpus I/O.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.batch_size == 0 {
            return Err(EvalError::invalid_config("batch_size must be > 0; got 0"));
        }
        if self.rocket_num_kernels == 0 {
            return Err(EvalError::invalid_config(
                "rocket_num_kernels must be > 0; got 0",
            ));
        }
        if !self.refinement.tau.is_finite() || self.refinement.tau <= 0.0 {
            return Err(EvalError::invalid_config(format!(
                "refinement.tau must be finite and > 0; got {}",
                self.refinement.tau
            )));
        }
        Ok(())
    }
}
