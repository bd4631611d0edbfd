// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::extractor::FeatureExtractor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use tseval_core::{EvalError, FeatureMatrix, TimeSeriesBatch};

const CANDIDATE_LENGTHS: [usize; 3] = [7, 9, 11];
/// Shortest input the dilation recipe is defined for: one more than the
/// longest candidate kernel.
const MIN_INPUT_LENGTH: usize = 12;
/// Feature count per kernel: proportion of positive values and max.
const FEATURES_PER_KERNEL: usize = 2;

/// One random convolution kernel of the bank.
#[derive(Clone, Debug, PartialEq)]
pub struct RocketKernel {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub dilation: usize,
    pub padding: usize,
}

impl RocketKernel {
    fn validate(&self, index: usize, input_length: usize) -> Result<(), EvalError> {
        if self.weights.is_empty() {
            return Err(EvalError::invalid_input(format!(
                "kernel {index} has no weights"
            )));
        }
        if self.dilation == 0 {
            return Err(EvalError::invalid_input(format!(
                "kernel {index} dilation must be >= 1"
            )));
        }
        let window = (self.weights.len() - 1) * self.dilation;
        if window + 1 > input_length + 2 * self.padding {
            return Err(EvalError::invalid_input(format!(
                "kernel {index} window {} exceeds padded input length {}",
                window + 1,
                input_length + 2 * self.padding
            )));
        }
        Ok(())
    }

    /// Applies the kernel to one series and summarizes the response map as
    /// (proportion-of-positive-values, max).
    fn apply(&self, series: &[f64]) -> (f64, f64) {
        let len = series.len() as isize;
        let padding = self.padding as isize;
        let dilation = self.dilation as isize;
        let window = (self.weights.len() as isize - 1) * dilation;

        let mut positive = 0usize;
        let mut outputs = 0usize;
        let mut max = f64::NEG_INFINITY;
        let mut start = -padding;
        while start + window < len + padding {
            let mut sum = self.bias;
            let mut index = start;
            for &weight in &self.weights {
                if index >= 0 && index < len {
                    sum += weight * series[index as usize];
                }
                index += dilation;
            }
            if sum > max {
                max = sum;
            }
            if sum > 0.0 {
                positive += 1;
            }
            outputs += 1;
            start += 1;
        }

        (positive as f64 / outputs as f64, max)
    }
}

/// Training-free feature extractor over a fixed bank of random convolution
/// kernels. The bank is generated once at construction from a seeded RNG;
/// extraction is purely input-deterministic afterwards.
///
/// Only univariate series are supported.
#[derive(Clone, Debug, PartialEq)]
pub struct RocketExtractor {
    kernels: Vec<RocketKernel>,
    input_length: usize,
}

impl RocketExtractor {
    /// Generates a bank of `num_kernels` random kernels for series of
    /// `input_length` samples.
    ///
    /// Per kernel: length drawn from {7, 9, 11}, weights sampled standard
    /// normal and mean-centered, bias uniform in [-1, 1), dilation
    /// 2^u with u uniform in [0, log2((input_length-1)/(length-1))), and
    /// half the kernels padded to center the window.
    pub fn new(input_length: usize, num_kernels: usize, seed: u64) -> Result<Self, EvalError> {
        if input_length < MIN_INPUT_LENGTH {
            return Err(EvalError::invalid_input(format!(
                "kernel bank requires input length >= {MIN_INPUT_LENGTH}; got {input_length}"
            )));
        }
        if num_kernels == 0 {
            return Err(EvalError::invalid_config(
                "rocket_num_kernels must be > 0; got 0",
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut kernels = Vec::with_capacity(num_kernels);
        for _ in 0..num_kernels {
            let length = CANDIDATE_LENGTHS[rng.gen_range(0..CANDIDATE_LENGTHS.len())];

            let mut weights: Vec<f64> = (0..length)
                .map(|_| StandardNormal.sample(&mut rng))
                .collect();
            let mean = weights.iter().sum::<f64>() / length as f64;
            for weight in &mut weights {
                *weight -= mean;
            }

            let bias = rng.gen_range(-1.0..1.0);

            let max_exponent = (((input_length - 1) as f64) / ((length - 1) as f64)).log2();
            let dilation = if max_exponent > 0.0 {
                let exponent: f64 = rng.gen_range(0.0..max_exponent);
                (2.0_f64.powf(exponent).floor() as usize).max(1)
            } else {
                1
            };

            let padding = if rng.gen_bool(0.5) {
                ((length - 1) * dilation) / 2
            } else {
                0
            };

            kernels.push(RocketKernel {
                weights,
                bias,
                dilation,
                padding,
            });
        }

        Self::from_kernels(kernels, input_length)
    }

    /// Wraps an explicit kernel bank, validating every kernel against the
    /// declared input length.
    pub fn from_kernels(
        kernels: Vec<RocketKernel>,
        input_length: usize,
    ) -> Result<Self, EvalError> {
        if kernels.is_empty() {
            return Err(EvalError::invalid_config(
                "kernel bank must contain at least one kernel",
            ));
        }
        if input_length == 0 {
            return Err(EvalError::invalid_input("input length must be >= 1"));
        }
        for (index, kernel) in kernels.iter().enumerate() {
            kernel.validate(index, input_length)?;
        }
        Ok(Self {
            kernels,
            input_length,
        })
    }

    pub fn num_kernels(&self) -> usize {
        self.kernels.len()
    }

    pub fn input_length(&self) -> usize {
        self.input_length
    }
}

impl FeatureExtractor for RocketExtractor {
    fn feature_dim(&self) -> usize {
        self.kernels.len() * FEATURES_PER_KERNEL
    }

    fn extract(&self, batch: &TimeSeriesBatch) -> Result<FeatureMatrix, EvalError> {
        if !batch.is_univariate() {
            return Err(EvalError::invalid_config(format!(
                "unsupported channel count: the kernel transform accepts univariate series only; got {} channels",
                batch.channels()
            )));
        }
        if batch.series_len() != self.input_length {
            return Err(EvalError::invalid_input(format!(
                "series length mismatch: kernel bank was generated for length {}, got {}",
                self.input_length,
                batch.series_len()
            )));
        }

        let dim = self.feature_dim();
        let mut values = Vec::with_capacity(batch.n() * dim);
        for i in 0..batch.n() {
            let series = batch.channel(i, 0);
            for kernel in &self.kernels {
                let (ppv, max) = kernel.apply(series);
                values.push(ppv);
                values.push(max);
            }
        }
        FeatureMatrix::new(values, batch.n(), dim)
    }
}

#[cfg(test)]
mod tests {
    use super::{RocketExtractor, RocketKernel};
    use crate::extractor::FeatureExtractor;
    use tseval_core::TimeSeriesBatch;

    fn univariate(rows: Vec<Vec<f64>>) -> TimeSeriesBatch {
        TimeSeriesBatch::from_univariate_rows(rows).expect("rows should form a valid batch")
    }

    #[test]
    fn bank_generation_is_seed_deterministic() {
        let a = RocketExtractor::new(64, 100, 42).expect("bank should generate");
        let b = RocketExtractor::new(64, 100, 42).expect("bank should generate");
        assert_eq!(a, b);

        let c = RocketExtractor::new(64, 100, 43).expect("bank should generate");
        assert_ne!(a, c, "different seeds should produce different banks");
    }

    #[test]
    fn repeated_extraction_is_bit_identical() {
        let extractor = RocketExtractor::new(64, 100, 7).expect("bank should generate");
        let series: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        let batch = univariate(vec![series]);

        let first = extractor.extract(&batch).expect("first extract");
        let second = extractor.extract(&batch).expect("second extract");
        assert_eq!(first, second);
        assert_eq!(first.dim(), 200);
    }

    #[test]
    fn ppv_stays_within_unit_interval() {
        let extractor = RocketExtractor::new(32, 50, 3).expect("bank should generate");
        let batch = univariate(vec![
            (0..32).map(|i| f64::from(i) - 16.0).collect(),
            vec![0.5; 32],
        ]);
        let features = extractor.extract(&batch).expect("extract should succeed");
        for row in 0..features.rows() {
            for pair in features.row(row).chunks_exact(2) {
                assert!(
                    (0.0..=1.0).contains(&pair[0]),
                    "ppv {} out of range",
                    pair[0]
                );
                assert!(pair[1].is_finite(), "max must be finite");
            }
        }
    }

    #[test]
    fn hand_computed_kernel_response() {
        // Sum-of-three window, no padding, no dilation: responses over
        // [1, -2, 3, -1, 2] are [2, 0, 4] -> ppv 2/3, max 4.
        let kernel = RocketKernel {
            weights: vec![1.0, 1.0, 1.0],
            bias: 0.0,
            dilation: 1,
            padding: 0,
        };
        let extractor =
            RocketExtractor::from_kernels(vec![kernel], 5).expect("bank should validate");
        let batch = univariate(vec![vec![1.0, -2.0, 3.0, -1.0, 2.0]]);
        let features = extractor.extract(&batch).expect("extract should succeed");
        assert_eq!(features.row(0)[0], 2.0 / 3.0);
        assert_eq!(features.row(0)[1], 4.0);
    }

    #[test]
    fn padded_kernel_sees_zero_flanks() {
        // Padding 1 slides the window from -1 to 1 over [1, 2, 3]; flank
        // positions read zeros, giving responses [3, 6, 5] -> ppv 1, max 6.
        let kernel = RocketKernel {
            weights: vec![1.0, 1.0, 1.0],
            bias: 0.0,
            dilation: 1,
            padding: 1,
        };
        let extractor =
            RocketExtractor::from_kernels(vec![kernel], 3).expect("bank should validate");
        let batch = univariate(vec![vec![1.0, 2.0, 3.0]]);
        let features = extractor.extract(&batch).expect("extract should succeed");
        assert_eq!(features.row(0)[0], 1.0);
        assert_eq!(features.row(0)[1], 6.0);
    }

    #[test]
    fn multichannel_input_is_rejected() {
        let extractor = RocketExtractor::new(16, 10, 0).expect("bank should generate");
        let batch = TimeSeriesBatch::new(vec![0.0; 2 * 16], 1, 2, 16)
            .expect("multichannel batch should be valid");
        let err = extractor
            .extract(&batch)
            .expect_err("multichannel input must fail");
        assert!(err.to_string().contains("unsupported channel count"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let extractor = RocketExtractor::new(64, 10, 0).expect("bank should generate");
        let batch = univariate(vec![vec![0.0; 32]]);
        let err = extractor
            .extract(&batch)
            .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("series length mismatch"));
    }

    #[test]
    fn generation_rejects_short_inputs_and_empty_banks() {
        let err = RocketExtractor::new(8, 10, 0).expect_err("short input must fail");
        assert!(err.to_string().contains("input length >= 12"));

        let err = RocketExtractor::new(64, 0, 0).expect_err("zero kernels must fail");
        assert!(err.to_string().contains("rocket_num_kernels must be > 0"));
    }

    #[test]
    fn dilated_window_never_exceeds_input() {
        let extractor = RocketExtractor::new(128, 200, 11).expect("bank should generate");
        let batch = univariate(vec![(0..128).map(|i| f64::from(i % 7)).collect()]);
        extractor
            .extract(&batch)
            .expect("every generated kernel should fit the input");
    }
}
