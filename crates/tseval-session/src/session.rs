// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::checkpoint::{
    load_artifact, CheckpointEnvelope, CLASSIFIER_ARTIFACT, FIDELITY_ENHANCER_ARTIFACT,
    STAGE2_ARTIFACT,
};
use crate::collaborators::{Refinement, Refiner, SampleGenerator, SampleKind, SampledSeries};
use crate::corpus::{ReferenceCorpus, ReferenceLoader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tseval_core::{
    run_batched, ClassProbabilities, EvalError, EvaluationConfig, ExtractorKind, FeatureMatrix,
    NullTelemetry, ProjectedSet, TelemetrySink, TimeSeriesBatch,
};
use tseval_features::{FcnExtractor, FcnWeights, FeatureExtractor, RocketExtractor};
use tseval_metrics::{
    frechet_distance, inception_score, remove_outliers, AxisBounds, FittedProjector,
};

/// Reference-corpus split selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Per-metric result: a value, or a documented skip when the metric had too
/// little finite data. Skips keep the surrounding evaluation run alive.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreOutcome<T> {
    Value(T),
    Skipped(String),
}

impl<T> ScoreOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

type GeneratorFactory =
    Box<dyn FnOnce(&CheckpointEnvelope) -> Result<Box<dyn SampleGenerator>, EvalError>>;
type RefinerFactory = Box<dyn FnOnce(&CheckpointEnvelope) -> Result<Box<dyn Refiner>, EvalError>>;

enum CorpusSource {
    Loader {
        loader: Box<dyn ReferenceLoader>,
        dataset: String,
        scaling: bool,
    },
    Direct(ReferenceCorpus),
}

enum GeneratorSource {
    Provided(Box<dyn SampleGenerator>),
    FromCheckpoint(GeneratorFactory),
}

enum RefinerSource {
    Provided(Box<dyn Refiner>),
    FromCheckpoint(RefinerFactory),
}

/// Assembles an [`EvaluationSession`]: configuration, reference corpus,
/// feature extractor, and the generative collaborators.
pub struct SessionBuilder {
    config: EvaluationConfig,
    corpus: Option<CorpusSource>,
    generator: Option<GeneratorSource>,
    refiner: Option<RefinerSource>,
    telemetry: Box<dyn TelemetrySink>,
}

impl SessionBuilder {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            corpus: None,
            generator: None,
            refiner: None,
            telemetry: Box::new(NullTelemetry),
        }
    }

    /// Resolves the corpus through a loader keyed by dataset identity.
    pub fn with_dataset(
        mut self,
        loader: Box<dyn ReferenceLoader>,
        dataset: impl Into<String>,
        scaling: bool,
    ) -> Self {
        self.corpus = Some(CorpusSource::Loader {
            loader,
            dataset: dataset.into(),
            scaling,
        });
        self
    }

    /// Supplies a corpus directly, bypassing dataset-identity lookup (the
    /// custom-dataset path).
    pub fn with_corpus(mut self, corpus: ReferenceCorpus) -> Self {
        self.corpus = Some(CorpusSource::Direct(corpus));
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn SampleGenerator>) -> Self {
        self.generator = Some(GeneratorSource::Provided(generator));
        self
    }

    /// Defers generator construction to `factory`, which receives the
    /// validated `stage2-<dataset>.ckpt` envelope at build time.
    pub fn load_generator<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&CheckpointEnvelope) -> Result<Box<dyn SampleGenerator>, EvalError> + 'static,
    {
        self.generator = Some(GeneratorSource::FromCheckpoint(Box::new(factory)));
        self
    }

    pub fn with_refiner(mut self, refiner: Box<dyn Refiner>) -> Self {
        self.refiner = Some(RefinerSource::Provided(refiner));
        self
    }

    /// Defers refiner construction to `factory`, which receives the
    /// validated `fidelity_enhancer-<dataset>.ckpt` envelope at build time.
    pub fn load_refiner<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&CheckpointEnvelope) -> Result<Box<dyn Refiner>, EvalError> + 'static,
    {
        self.refiner = Some(RefinerSource::FromCheckpoint(Box::new(factory)));
        self
    }

    pub fn with_telemetry(mut self, telemetry: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Validates the configuration, loads every pretrained artifact, caches
    /// the reference feature sets, and fits the projector.
    pub fn build(self) -> Result<EvaluationSession, EvalError> {
        let Self {
            config,
            corpus,
            generator,
            refiner,
            telemetry,
        } = self;

        config.validate()?;

        let (corpus, dataset) = match corpus {
            Some(CorpusSource::Loader {
                loader,
                dataset,
                scaling,
            }) => (loader.load(&dataset, scaling)?, Some(dataset)),
            Some(CorpusSource::Direct(corpus)) => (corpus, None),
            None => {
                return Err(EvalError::invalid_config(
                    "a reference corpus is required: use with_dataset or with_corpus",
                ))
            }
        };

        let (extractor, classifier) = build_extractor(&config, &corpus, dataset.as_deref())?;

        let generator = match generator {
            Some(GeneratorSource::Provided(generator)) => generator,
            Some(GeneratorSource::FromCheckpoint(factory)) => {
                let dataset = dataset.as_deref().ok_or_else(|| {
                    EvalError::invalid_config(
                        "loading the generator from a checkpoint requires a dataset identity",
                    )
                })?;
                let envelope =
                    load_artifact(&config.checkpoint_dir, STAGE2_ARTIFACT, dataset)?;
                factory(&envelope)?
            }
            None => {
                return Err(EvalError::invalid_config(
                    "a sample generator collaborator is required",
                ))
            }
        };

        let refinement = if config.refinement.enabled {
            match refiner {
                Some(RefinerSource::Provided(refiner)) => Refinement::Active(refiner),
                Some(RefinerSource::FromCheckpoint(factory)) => {
                    let dataset = dataset.as_deref().ok_or_else(|| {
                        EvalError::invalid_config(
                            "loading the refiner from a checkpoint requires a dataset identity",
                        )
                    })?;
                    let envelope = load_artifact(
                        &config.checkpoint_dir,
                        FIDELITY_ENHANCER_ARTIFACT,
                        dataset,
                    )?;
                    Refinement::Active(factory(&envelope)?)
                }
                None => {
                    return Err(EvalError::invalid_config(
                        "refinement is enabled but no refiner collaborator was provided",
                    ))
                }
            }
        } else {
            Refinement::PassThrough
        };

        let z_train = extract_features(extractor.as_ref(), corpus.x_train(), config.batch_size)?;
        let z_test = extract_features(extractor.as_ref(), corpus.x_test(), config.batch_size)?;
        let projector = FittedProjector::fit(&z_train)?;
        debug!(
            n_train = z_train.rows(),
            n_test = z_test.rows(),
            feature_dim = z_train.dim(),
            refinement_active = refinement.is_active(),
            "evaluation session ready"
        );

        Ok(EvaluationSession {
            config,
            dataset,
            corpus,
            extractor,
            classifier,
            generator,
            refinement,
            telemetry,
            z_train,
            z_test,
            projector,
        })
    }
}

fn load_classifier(dir: &Path, dataset: &str) -> Result<FcnExtractor, EvalError> {
    let envelope = load_artifact(dir, CLASSIFIER_ARTIFACT, dataset)?;
    let weights: FcnWeights = envelope.decode_payload()?;
    FcnExtractor::new(weights)
}

fn build_extractor(
    config: &EvaluationConfig,
    corpus: &ReferenceCorpus,
    dataset: Option<&str>,
) -> Result<(Arc<dyn FeatureExtractor>, Option<Arc<FcnExtractor>>), EvalError> {
    match config.feature_extractor {
        ExtractorKind::SupervisedFcn => {
            let dataset = dataset.ok_or_else(|| {
                EvalError::invalid_config(
                    "the supervised_fcn extractor requires a dataset identity; custom corpora must use the kernel transform",
                )
            })?;
            let classifier = Arc::new(load_classifier(&config.checkpoint_dir, dataset)?);
            let extractor: Arc<dyn FeatureExtractor> = classifier.clone();
            Ok((extractor, Some(classifier)))
        }
        ExtractorKind::Rocket => {
            let rocket = RocketExtractor::new(
                corpus.series_len(),
                config.rocket_num_kernels,
                config.rocket_seed,
            )?;
            // The classifier is still useful for the concentration score
            // when its checkpoint exists; a missing file just disables it.
            let classifier = match dataset {
                Some(dataset) => match load_classifier(&config.checkpoint_dir, dataset) {
                    Ok(classifier) => Some(Arc::new(classifier)),
                    Err(EvalError::MissingCheckpoint { .. }) => {
                        debug!(dataset, "no classifier checkpoint; concentration scoring disabled");
                        None
                    }
                    Err(err) => return Err(err),
                },
                None => None,
            };
            let extractor: Arc<dyn FeatureExtractor> = Arc::new(rocket);
            Ok((extractor, classifier))
        }
    }
}

fn extract_features(
    extractor: &dyn FeatureExtractor,
    batch: &TimeSeriesBatch,
    batch_size: usize,
) -> Result<FeatureMatrix, EvalError> {
    run_batched(batch.n(), batch_size, |range| {
        extractor.extract(&batch.slice(range)?)
    })
}

/// Top-level orchestration: owns the reference corpus, the cached
/// reference feature sets, the fitted projector, and the collaborators.
/// All caches are computed once at construction and never re-derived.
pub struct EvaluationSession {
    config: EvaluationConfig,
    dataset: Option<String>,
    corpus: ReferenceCorpus,
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Option<Arc<FcnExtractor>>,
    generator: Box<dyn SampleGenerator>,
    refinement: Refinement,
    telemetry: Box<dyn TelemetrySink>,
    z_train: FeatureMatrix,
    z_test: FeatureMatrix,
    projector: FittedProjector,
}

impl std::fmt::Debug for EvaluationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationSession")
            .field("config", &self.config)
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}

impl EvaluationSession {
    pub fn builder(config: EvaluationConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn corpus(&self) -> &ReferenceCorpus {
        &self.corpus
    }

    pub fn n_classes(&self) -> usize {
        self.corpus.n_classes()
    }

    /// Cached features of the reference train split.
    pub fn z_train(&self) -> &FeatureMatrix {
        &self.z_train
    }

    /// Cached features of the reference test split.
    pub fn z_test(&self) -> &FeatureMatrix {
        &self.z_test
    }

    pub fn projector(&self) -> &FittedProjector {
        &self.projector
    }

    pub fn axis_bounds(&self) -> AxisBounds {
        self.projector.bounds()
    }

    /// Draws `n_samples` from the generative collaborator and refines the
    /// assembled batch in `batch_size` chunks. Returns the raw sampled
    /// components alongside the refined batch.
    pub fn generate(
        &self,
        n_samples: usize,
        kind: SampleKind,
        class_index: Option<usize>,
    ) -> Result<(SampledSeries, TimeSeriesBatch), EvalError> {
        if n_samples == 0 {
            return Err(EvalError::invalid_input("n_samples must be >= 1"));
        }
        match (kind, class_index) {
            (SampleKind::Conditional, None) => {
                return Err(EvalError::invalid_input(
                    "conditional sampling requires a class index",
                ))
            }
            (SampleKind::Conditional, Some(class_index)) => {
                let n_classes = self.corpus.n_classes();
                if class_index >= n_classes {
                    return Err(EvalError::invalid_input(format!(
                        "class index {class_index} out of range for {n_classes} classes"
                    )));
                }
            }
            (SampleKind::Unconditional, Some(_)) => {
                return Err(EvalError::invalid_input(
                    "unconditional sampling does not take a class index",
                ))
            }
            (SampleKind::Unconditional, None) => {}
        }

        let sampled = self.generator.sample(kind, n_samples, class_index)?;
        self.check_generated_shape("sampled", &sampled.full, n_samples)?;

        let refined = run_batched(n_samples, self.config.batch_size, |range| {
            self.refinement.refine(&sampled.full.slice(range)?)
        })?;
        self.check_generated_shape("refined", &refined, n_samples)?;

        Ok((sampled, refined))
    }

    /// Feature set of an arbitrary batch through the configured extractor,
    /// batched by `batch_size`.
    pub fn features_of(&self, batch: &TimeSeriesBatch) -> Result<FeatureMatrix, EvalError> {
        extract_features(self.extractor.as_ref(), batch, self.config.batch_size)
    }

    /// Feature set of a reference split after an encoder/decoder round trip
    /// through the generative collaborator.
    pub fn reconstruction_features(&self, split: Split) -> Result<FeatureMatrix, EvalError> {
        let source = match split {
            Split::Train => self.corpus.x_train(),
            Split::Test => self.corpus.x_test(),
        };
        run_batched(source.n(), self.config.batch_size, |range| {
            let slice = source.slice(range)?;
            let reconstructed = self.generator.reconstruct(&slice)?;
            if reconstructed.n() != slice.n()
                || reconstructed.channels() != slice.channels()
                || reconstructed.series_len() != slice.series_len()
            {
                return Err(EvalError::invalid_input(format!(
                    "reconstruction shape mismatch: got (n={}, channels={}, len={}), expected (n={}, channels={}, len={})",
                    reconstructed.n(),
                    reconstructed.channels(),
                    reconstructed.series_len(),
                    slice.n(),
                    slice.channels(),
                    slice.series_len()
                )));
            }
            self.extractor.extract(&reconstructed)
        })
    }

    /// Class-probability distributions from the frozen classifier's softmax
    /// head, batched by `batch_size`.
    pub fn class_probabilities(
        &self,
        batch: &TimeSeriesBatch,
    ) -> Result<ClassProbabilities, EvalError> {
        let Some(classifier) = self.classifier.as_deref() else {
            return Err(EvalError::invalid_config(
                "class probabilities require the pretrained classifier; configure supervised_fcn or provide its checkpoint",
            ));
        };
        run_batched(batch.n(), self.config.batch_size, |range| {
            classifier.classify(&batch.slice(range)?)
        })
    }

    /// Distribution-distance score between two feature sets. An
    /// insufficient-data outcome is reported as a skip instead of an error
    /// so one starved metric cannot abort a whole evaluation run.
    pub fn score_fid(
        &self,
        a: &FeatureMatrix,
        b: &FeatureMatrix,
    ) -> Result<ScoreOutcome<f64>, EvalError> {
        match frechet_distance(a, b) {
            Ok(value) => Ok(ScoreOutcome::Value(value)),
            Err(err) if err.is_insufficient_data() => {
                warn!(error = %err, "distribution distance skipped");
                Ok(ScoreOutcome::Skipped(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Concentration score (mean, std) over predicted class distributions,
    /// with the same per-metric skip policy as [`Self::score_fid`].
    pub fn score_is(
        &self,
        probs: &ClassProbabilities,
    ) -> Result<ScoreOutcome<(f64, f64)>, EvalError> {
        match inception_score(probs) {
            Ok(value) => Ok(ScoreOutcome::Value(value)),
            Err(err) if err.is_insufficient_data() => {
                warn!(error = %err, "concentration score skipped");
                Ok(ScoreOutcome::Skipped(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Fire-and-forget scalar telemetry; sink failures are logged, never
    /// propagated.
    pub fn log_scalar(&self, key: &str, value: f64) {
        if let Err(err) = self.telemetry.record_scalar(key, value) {
            warn!(key, error = %err, "telemetry scalar dropped");
        }
    }

    /// Projects each labelled feature set with the fitted projector and
    /// forwards the scatter data to the sink. Fire-and-forget like
    /// [`Self::log_scalar`].
    pub fn log_projection(&self, key: &str, sets: &[(&str, &FeatureMatrix)]) {
        let mut projected = Vec::with_capacity(sets.len());
        for (label, features) in sets {
            match self.projector.project(&remove_outliers(features)) {
                Ok(points) => projected.push(ProjectedSet {
                    label: (*label).to_string(),
                    points,
                }),
                Err(err) => {
                    warn!(key, label, error = %err, "telemetry projection dropped");
                    return;
                }
            }
        }
        if let Err(err) = self.telemetry.record_projection(key, &projected) {
            warn!(key, error = %err, "telemetry projection dropped");
        }
    }

    fn check_generated_shape(
        &self,
        stage: &str,
        batch: &TimeSeriesBatch,
        n_samples: usize,
    ) -> Result<(), EvalError> {
        if batch.n() != n_samples
            || batch.channels() != self.corpus.channels()
            || batch.series_len() != self.corpus.series_len()
        {
            return Err(EvalError::invalid_input(format!(
                "{stage} batch shape mismatch: got (n={}, channels={}, len={}), expected (n={n_samples}, channels={}, len={})",
                batch.n(),
                batch.channels(),
                batch.series_len(),
                self.corpus.channels(),
                self.corpus.series_len()
            )));
        }
        Ok(())
    }
}
