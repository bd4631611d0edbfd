// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use tseval_core::{EvalError, EvaluationConfig, ExtractorKind, TimeSeriesBatch};
use tseval_session::{
    ReferenceCorpus, SampleGenerator, SampleKind, SampledSeries, SessionBuilder,
};

const SERIES_LEN: usize = 64;

/// Draws one series from the structured family: a sine with random phase,
/// amplitude, and mild observation noise.
fn family_series(rng: &mut ChaCha8Rng) -> Vec<f64> {
    let amplitude = rng.gen_range(0.8..1.2);
    let phase = rng.gen_range(0.0..std::f64::consts::TAU);
    let frequency = rng.gen_range(0.18..0.22);
    (0..SERIES_LEN)
        .map(|t| {
            let noise: f64 = StandardNormal.sample(rng);
            amplitude * (t as f64 * frequency + phase).sin() + 0.05 * noise
        })
        .collect()
}

fn family_batch(rng: &mut ChaCha8Rng, n: usize) -> TimeSeriesBatch {
    TimeSeriesBatch::from_univariate_rows((0..n).map(|_| family_series(rng)).collect())
        .expect("family batch should be valid")
}

fn noise_batch(rng: &mut ChaCha8Rng, n: usize) -> TimeSeriesBatch {
    let rows = (0..n)
        .map(|_| (0..SERIES_LEN).map(|_| StandardNormal.sample(rng)).collect())
        .collect();
    TimeSeriesBatch::from_univariate_rows(rows).expect("noise batch should be valid")
}

/// Stub generative collaborator holding a pre-drawn pool from the same
/// distribution as the reference data.
struct PoolGenerator {
    pool: TimeSeriesBatch,
}

impl PoolGenerator {
    fn new(seed: u64, capacity: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self {
            pool: family_batch(&mut rng, capacity),
        }
    }
}

impl SampleGenerator for PoolGenerator {
    fn sample(
        &self,
        _kind: SampleKind,
        n_samples: usize,
        _class_index: Option<usize>,
    ) -> Result<SampledSeries, EvalError> {
        if n_samples > self.pool.n() {
            return Err(EvalError::invalid_input(format!(
                "pool exhausted: requested {n_samples}, capacity {}",
                self.pool.n()
            )));
        }
        let full = self.pool.slice(0..n_samples)?;
        SampledSeries::new(full.clone(), full.clone(), full)
    }

    fn reconstruct(&self, batch: &TimeSeriesBatch) -> Result<TimeSeriesBatch, EvalError> {
        Ok(batch.clone())
    }
}

fn corpus(rng: &mut ChaCha8Rng) -> ReferenceCorpus {
    let x_train = family_batch(rng, 100);
    let x_test = family_batch(rng, 50);
    let y_train = (0..100).map(|i| (i % 2) as i64).collect();
    let y_test = (0..50).map(|i| (i % 2) as i64).collect();
    ReferenceCorpus::new(x_train, y_train, x_test, y_test).expect("corpus should be valid")
}

#[test]
fn in_distribution_samples_score_far_below_noise() {
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let corpus = corpus(&mut rng);

    let mut config = EvaluationConfig::with_extractor(ExtractorKind::Rocket);
    config.batch_size = 16;
    config.rocket_num_kernels = 50;
    config.rocket_seed = 7;

    let session = SessionBuilder::new(config)
        .with_corpus(corpus)
        .with_generator(Box::new(PoolGenerator::new(99, 50)))
        .build()
        .expect("session should build");

    let (sampled, refined) = session
        .generate(50, SampleKind::Unconditional, None)
        .expect("generate should succeed");
    // Refinement is disabled, so the refined batch echoes the raw samples.
    assert_eq!(sampled.full, refined);

    let z_test = session.z_test().clone();
    let z_generated = session
        .features_of(&refined)
        .expect("generated features should extract");
    let z_noise = session
        .features_of(&noise_batch(&mut rng, 50))
        .expect("noise features should extract");

    let fid_generated = *session
        .score_fid(&z_test, &z_generated)
        .expect("generated score should compute")
        .value()
        .expect("generated score should not skip");
    let fid_noise = *session
        .score_fid(&z_test, &z_noise)
        .expect("noise score should compute")
        .value()
        .expect("noise score should not skip");

    assert!(fid_generated.is_finite());
    assert!(fid_generated >= 0.0);
    assert!(fid_noise.is_finite());
    assert!(
        fid_noise > 3.0 * fid_generated,
        "noise should score far above in-distribution samples: fid_generated={fid_generated}, fid_noise={fid_noise}"
    );
}

#[test]
fn scores_are_stable_across_batch_sizes() {
    let mut rng = ChaCha8Rng::seed_from_u64(5678);
    let reference = corpus(&mut rng);

    let build = |batch_size: usize| {
        let mut config = EvaluationConfig::with_extractor(ExtractorKind::Rocket);
        config.batch_size = batch_size;
        config.rocket_num_kernels = 30;
        config.rocket_seed = 21;
        SessionBuilder::new(config)
            .with_corpus(reference.clone())
            .with_generator(Box::new(PoolGenerator::new(4, 50)))
            .build()
            .expect("session should build")
    };

    let small_batches = build(7);
    let one_batch = build(128);

    assert_eq!(small_batches.z_train(), one_batch.z_train());
    assert_eq!(small_batches.z_test(), one_batch.z_test());

    let fid_small = *small_batches
        .score_fid(small_batches.z_train(), small_batches.z_test())
        .expect("score should compute")
        .value()
        .expect("score should not skip");
    let fid_one = *one_batch
        .score_fid(one_batch.z_train(), one_batch.z_test())
        .expect("score should compute")
        .value()
        .expect("score should not skip");
    assert_eq!(fid_small, fid_one);
}
