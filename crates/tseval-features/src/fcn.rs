// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::extractor::FeatureExtractor;
use serde::{Deserialize, Serialize};
use tseval_core::{ClassProbabilities, EvalError, FeatureMatrix, TimeSeriesBatch};

/// One convolutional block of the frozen classifier: 1-D convolution with
/// `same` padding, followed by a per-channel affine (the batch-norm of the
/// trained network folded into scale/shift) and ReLU.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvBlock {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_len: usize,
    /// Row-major `(out_channels, in_channels, kernel_len)` weights.
    pub weights: Vec<f64>,
    /// Per-output-channel affine scale (folded batch-norm).
    pub scale: Vec<f64>,
    /// Per-output-channel affine shift (folded batch-norm).
    pub shift: Vec<f64>,
}

impl ConvBlock {
    fn validate(&self, index: usize) -> Result<(), EvalError> {
        if self.in_channels == 0 || self.out_channels == 0 || self.kernel_len == 0 {
            return Err(EvalError::invalid_input(format!(
                "block {index} has zero-sized dims (in={}, out={}, kernel={})",
                self.in_channels, self.out_channels, self.kernel_len
            )));
        }
        let expected = self.out_channels * self.in_channels * self.kernel_len;
        if self.weights.len() != expected {
            return Err(EvalError::invalid_input(format!(
                "block {index} weight count mismatch: got {}, expected {expected}",
                self.weights.len()
            )));
        }
        if self.scale.len() != self.out_channels || self.shift.len() != self.out_channels {
            return Err(EvalError::invalid_input(format!(
                "block {index} affine length mismatch: scale={}, shift={}, expected {}",
                self.scale.len(),
                self.shift.len(),
                self.out_channels
            )));
        }
        let non_finite = self
            .weights
            .iter()
            .chain(&self.scale)
            .chain(&self.shift)
            .any(|value| !value.is_finite());
        if non_finite {
            return Err(EvalError::invalid_input(format!(
                "block {index} contains non-finite parameters"
            )));
        }
        Ok(())
    }

    fn weight(&self, out_channel: usize, in_channel: usize, tap: usize) -> f64 {
        self.weights[(out_channel * self.in_channels + in_channel) * self.kernel_len + tap]
    }

    /// Applies the block to channel-major feature maps of one series.
    fn forward(&self, maps: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let len = maps[0].len();
        let pad = (self.kernel_len - 1) / 2;

        let mut out = Vec::with_capacity(self.out_channels);
        for out_channel in 0..self.out_channels {
            let mut channel = Vec::with_capacity(len);
            for t in 0..len {
                let mut sum = 0.0;
                for (in_channel, map) in maps.iter().enumerate() {
                    for tap in 0..self.kernel_len {
                        let source = t as isize + tap as isize - pad as isize;
                        if source >= 0 && (source as usize) < len {
                            sum += self.weight(out_channel, in_channel, tap)
                                * map[source as usize];
                        }
                    }
                }
                let activated = self.scale[out_channel] * sum + self.shift[out_channel];
                channel.push(activated.max(0.0));
            }
            out.push(channel);
        }
        out
    }
}

/// Frozen parameters of the pretrained fully-convolutional classifier:
/// convolutional trunk, then global average pooling into the penultimate
/// embedding, then a linear softmax head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FcnWeights {
    pub blocks: Vec<ConvBlock>,
    /// Row-major `(n_classes, embedding_dim)` head weights.
    pub head_weights: Vec<f64>,
    pub head_bias: Vec<f64>,
    pub n_classes: usize,
}

impl FcnWeights {
    pub fn embedding_dim(&self) -> usize {
        self.blocks.last().map_or(0, |block| block.out_channels)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.blocks.is_empty() {
            return Err(EvalError::invalid_input(
                "classifier must have at least one convolutional block",
            ));
        }
        for (index, block) in self.blocks.iter().enumerate() {
            block.validate(index)?;
        }
        for index in 1..self.blocks.len() {
            if self.blocks[index].in_channels != self.blocks[index - 1].out_channels {
                return Err(EvalError::invalid_input(format!(
                    "block {index} input channels ({}) do not match block {} output channels ({})",
                    self.blocks[index].in_channels,
                    index - 1,
                    self.blocks[index - 1].out_channels
                )));
            }
        }
        if self.n_classes == 0 {
            return Err(EvalError::invalid_input("class count must be >= 1"));
        }
        let embedding_dim = self.embedding_dim();
        if self.head_weights.len() != self.n_classes * embedding_dim {
            return Err(EvalError::invalid_input(format!(
                "head weight count mismatch: got {}, expected {} (n_classes={} x embedding_dim={embedding_dim})",
                self.head_weights.len(),
                self.n_classes * embedding_dim,
                self.n_classes
            )));
        }
        if self.head_bias.len() != self.n_classes {
            return Err(EvalError::invalid_input(format!(
                "head bias length mismatch: got {}, expected {}",
                self.head_bias.len(),
                self.n_classes
            )));
        }
        let non_finite = self
            .head_weights
            .iter()
            .chain(&self.head_bias)
            .any(|value| !value.is_finite());
        if non_finite {
            return Err(EvalError::invalid_input(
                "classifier head contains non-finite parameters",
            ));
        }
        Ok(())
    }
}

/// Frozen pretrained classifier used as a feature extractor: `extract`
/// returns the penultimate embedding, `classify` the softmax head.
///
/// Weights are never mutated; inference is deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct FcnExtractor {
    weights: FcnWeights,
}

impl FcnExtractor {
    pub fn new(weights: FcnWeights) -> Result<Self, EvalError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn n_classes(&self) -> usize {
        self.weights.n_classes
    }

    fn check_input(&self, batch: &TimeSeriesBatch) -> Result<(), EvalError> {
        let expected = self.weights.blocks[0].in_channels;
        if batch.channels() != expected {
            return Err(EvalError::invalid_input(format!(
                "channel count mismatch: classifier expects {expected}, got {}",
                batch.channels()
            )));
        }
        Ok(())
    }

    /// Trunk forward pass for one series: conv blocks, then global average
    /// pooling per channel.
    fn embed_series(&self, batch: &TimeSeriesBatch, i: usize) -> Vec<f64> {
        let mut maps: Vec<Vec<f64>> = (0..batch.channels())
            .map(|channel| batch.channel(i, channel).to_vec())
            .collect();
        for block in &self.weights.blocks {
            maps = block.forward(&maps);
        }
        maps.iter()
            .map(|map| map.iter().sum::<f64>() / map.len() as f64)
            .collect()
    }

    fn head_logits(&self, embedding: &[f64]) -> Vec<f64> {
        let dim = embedding.len();
        (0..self.weights.n_classes)
            .map(|class| {
                let row = &self.weights.head_weights[class * dim..(class + 1) * dim];
                row.iter()
                    .zip(embedding)
                    .map(|(w, e)| w * e)
                    .sum::<f64>()
                    + self.weights.head_bias[class]
            })
            .collect()
    }

    /// Class-probability head: softmax over the linear logits.
    pub fn classify(&self, batch: &TimeSeriesBatch) -> Result<ClassProbabilities, EvalError> {
        self.check_input(batch)?;

        let mut rows = Vec::with_capacity(batch.n());
        for i in 0..batch.n() {
            let embedding = self.embed_series(batch, i);
            let logits = self.head_logits(&embedding);
            rows.push(softmax(&logits));
        }
        ClassProbabilities::from_rows(rows)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&logit| (logit - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|value| value / sum).collect()
}

impl FeatureExtractor for FcnExtractor {
    fn feature_dim(&self) -> usize {
        self.weights.embedding_dim()
    }

    fn extract(&self, batch: &TimeSeriesBatch) -> Result<FeatureMatrix, EvalError> {
        self.check_input(batch)?;

        let rows = (0..batch.n())
            .map(|i| self.embed_series(batch, i))
            .collect();
        FeatureMatrix::from_rows(rows)
    }
}
