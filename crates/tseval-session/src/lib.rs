// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod collaborators;
pub mod corpus;
pub mod session;

pub use checkpoint::{
    checkpoint_file_name, checkpoint_path, load_artifact, store_artifact, CheckpointEnvelope,
    PayloadCodec, CLASSIFIER_ARTIFACT, CURRENT_CHECKPOINT_SCHEMA_VERSION,
    FIDELITY_ENHANCER_ARTIFACT, MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION, STAGE2_ARTIFACT,
};
pub use collaborators::{Refinement, Refiner, SampleGenerator, SampleKind, SampledSeries};
pub use corpus::{ReferenceCorpus, ReferenceLoader, UcrDirectoryLoader};
pub use session::{EvaluationSession, ScoreOutcome, SessionBuilder, Split};
