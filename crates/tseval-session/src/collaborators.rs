// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use tseval_core::{EvalError, TimeSeriesBatch};

/// Sampling mode of the generative collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Unconditional,
    /// Sample a single class; the session validates the class index against
    /// the reference corpus.
    Conditional,
}

/// Raw output of one sampling call: the frequency-split components the
/// multi-stage decoder produces alongside the assembled series.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledSeries {
    pub lowfreq: TimeSeriesBatch,
    pub highfreq: TimeSeriesBatch,
    pub full: TimeSeriesBatch,
}

impl SampledSeries {
    /// Bundles the component triple, demanding one common shape.
    pub fn new(
        lowfreq: TimeSeriesBatch,
        highfreq: TimeSeriesBatch,
        full: TimeSeriesBatch,
    ) -> Result<Self, EvalError> {
        for (name, part) in [("lowfreq", &lowfreq), ("highfreq", &highfreq)] {
            if part.n() != full.n()
                || part.channels() != full.channels()
                || part.series_len() != full.series_len()
            {
                return Err(EvalError::invalid_input(format!(
                    "sampled {name} component shape (n={}, channels={}, len={}) does not match full batch (n={}, channels={}, len={})",
                    part.n(),
                    part.channels(),
                    part.series_len(),
                    full.n(),
                    full.channels(),
                    full.series_len()
                )));
            }
        }
        Ok(Self {
            lowfreq,
            highfreq,
            full,
        })
    }
}

/// Opaque generative collaborator: a pretrained multi-stage decoder exposed
/// through sampling and reconstruction only. Implementations must be
/// deterministic with respect to their own internal state and must not
/// require mutable access.
pub trait SampleGenerator {
    fn sample(
        &self,
        kind: SampleKind,
        n_samples: usize,
        class_index: Option<usize>,
    ) -> Result<SampledSeries, EvalError>;

    /// Encoder/decoder round trip of real series through the model.
    fn reconstruct(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError>;
}

/// Learned residual post-processing applied to generated series before
/// re-scoring.
pub trait Refiner {
    fn refine(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError>;
}

/// Refinement capability selected at session construction: either the
/// learned module or an identity pass-through, never a runtime type check.
pub enum Refinement {
    Active(Box<dyn Refiner>),
    PassThrough,
}

impl Refinement {
    pub fn refine(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError> {
        match self {
            Self::Active(refiner) => refiner.refine(batch),
            Self::PassThrough => Ok(batch.clone()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{Refinement, Refiner, SampleGenerator, SampleKind, SampledSeries};
    use tseval_core::{EvalError, TimeSeriesBatch};

    fn constant_batch(n: usize, len: usize, value: f64) -> TimeSeriesBatch {
        TimeSeriesBatch::from_univariate_rows(vec![vec![value; len]; n])
            .expect("constant batch should be valid")
    }

    struct ConstantGenerator;

    impl SampleGenerator for ConstantGenerator {
        fn sample(
            &self,
            _kind: SampleKind,
            n_samples: usize,
            _class_index: Option<usize>,
        ) -> Result<SampledSeries, EvalError> {
            SampledSeries::new(
                constant_batch(n_samples, 8, 0.25),
                constant_batch(n_samples, 8, 0.5),
                constant_batch(n_samples, 8, 0.75),
            )
        }

        fn reconstruct(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError> {
            Ok(batch.clone())
        }
    }

    struct OffsetRefiner;

    impl Refiner for OffsetRefiner {
        fn refine(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError> {
            let rows = (0..batch.n())
                .map(|i| batch.series(i).iter().map(|v| v + 1.0).collect())
                .collect();
            TimeSeriesBatch::from_univariate_rows(rows)
        }
    }

    #[test]
    fn generator_trait_shape_sanity() {
        let generator = ConstantGenerator;
        let sampled = generator
            .sample(SampleKind::Unconditional, 3, None)
            .expect("sample should succeed");
        assert_eq!(sampled.full.n(), 3);
        assert_eq!(sampled.lowfreq.series(0), &[0.25; 8]);

        let reconstructed = generator
            .reconstruct(&sampled.full)
            .expect("reconstruct should succeed");
        assert_eq!(reconstructed, sampled.full);
    }

    #[test]
    fn sampled_series_rejects_component_shape_mismatch() {
        let err = SampledSeries::new(
            constant_batch(2, 8, 0.0),
            constant_batch(2, 6, 0.0),
            constant_batch(2, 8, 0.0),
        )
        .expect_err("component shape mismatch must fail");
        assert!(err.to_string().contains("highfreq component shape"));
    }

    #[test]
    fn pass_through_refinement_is_identity() {
        let refinement = Refinement::PassThrough;
        assert!(!refinement.is_active());
        let batch = constant_batch(2, 4, 1.5);
        let refined = refinement.refine(&batch).expect("refine should succeed");
        assert_eq!(refined, batch);
    }

    #[test]
    fn active_refinement_delegates_to_the_module() {
        let refinement = Refinement::Active(Box::new(OffsetRefiner));
        assert!(refinement.is_active());
        let batch = constant_batch(1, 4, 1.0);
        let refined = refinement.refine(&batch).expect("refine should succeed");
        assert_eq!(refined.series(0), &[2.0, 2.0, 2.0, 2.0]);
    }
}
