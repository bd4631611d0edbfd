// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tseval_core::EvalError;

/// Current checkpoint schema version emitted by writers.
pub const CURRENT_CHECKPOINT_SCHEMA_VERSION: u32 = 1;
/// Minimum checkpoint schema version accepted by readers.
pub const MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Artifact id of the multi-stage generative decoder.
pub const STAGE2_ARTIFACT: &str = "stage2";
/// Artifact id of the learned residual refinement module.
pub const FIDELITY_ENHANCER_ARTIFACT: &str = "fidelity_enhancer";
/// Artifact id of the frozen pretrained classifier.
pub const CLASSIFIER_ARTIFACT: &str = "fcn";

const CHECKPOINT_EXTENSION: &str = "ckpt";

/// Supported codec for artifact payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCodec {
    Json,
    Bincode,
}

/// Serialized envelope around one pretrained artifact. The payload bytes
/// are opaque to the session; whoever owns the artifact decodes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub artifact_id: String,
    pub dataset: String,
    pub state_schema_version: u32,
    pub engine_fingerprint: String,
    pub created_at_ns: i64,
    pub payload_crc32: u32,
    pub payload_codec: PayloadCodec,
    pub payload: Vec<u8>,
}

impl CheckpointEnvelope {
    /// Encodes `state` under the requested codec and wraps it with current
    /// metadata.
    pub fn seal<T: Serialize>(
        artifact_id: &str,
        dataset: &str,
        codec: PayloadCodec,
        state: &T,
    ) -> Result<Self, EvalError> {
        let payload = match codec {
            PayloadCodec::Json => serde_json::to_vec(state).map_err(|err| {
                EvalError::corrupt(format!("payload serialization failed (codec=json): {err}"))
            })?,
            PayloadCodec::Bincode => bincode::serialize(state).map_err(|err| {
                EvalError::corrupt(format!(
                    "payload serialization failed (codec=bincode): {err}"
                ))
            })?,
        };

        let created_at_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as i64)
            .unwrap_or(0);

        let envelope = Self {
            artifact_id: artifact_id.to_string(),
            dataset: dataset.to_string(),
            state_schema_version: CURRENT_CHECKPOINT_SCHEMA_VERSION,
            engine_fingerprint: format!("tseval-{}", env!("CARGO_PKG_VERSION")),
            created_at_ns,
            payload_crc32: crc32fast::hash(&payload),
            payload_codec: codec,
            payload,
        };
        envelope.validate_metadata()?;
        Ok(envelope)
    }

    fn validate_metadata(&self) -> Result<(), EvalError> {
        if self.artifact_id.trim().is_empty() {
            return Err(EvalError::corrupt("checkpoint artifact_id must be non-empty"));
        }
        if self.dataset.trim().is_empty() {
            return Err(EvalError::corrupt("checkpoint dataset must be non-empty"));
        }
        if self.state_schema_version < MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION
            || self.state_schema_version > CURRENT_CHECKPOINT_SCHEMA_VERSION
        {
            return Err(EvalError::corrupt(format!(
                "unsupported checkpoint schema version {}: supported range is {MIN_SUPPORTED_CHECKPOINT_SCHEMA_VERSION}..={CURRENT_CHECKPOINT_SCHEMA_VERSION}",
                self.state_schema_version
            )));
        }
        Ok(())
    }

    fn verify_payload_crc32(&self) -> Result<(), EvalError> {
        let actual = crc32fast::hash(&self.payload);
        if actual != self.payload_crc32 {
            return Err(EvalError::corrupt(format!(
                "checkpoint payload crc mismatch: stored {:#010x}, computed {actual:#010x}",
                self.payload_crc32
            )));
        }
        Ok(())
    }

    /// Decodes the payload under the declared codec.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EvalError> {
        match self.payload_codec {
            PayloadCodec::Json => serde_json::from_slice(&self.payload).map_err(|err| {
                EvalError::corrupt(format!("payload decode failed (codec=json): {err}"))
            }),
            PayloadCodec::Bincode => bincode::deserialize(&self.payload).map_err(|err| {
                EvalError::corrupt(format!("payload decode failed (codec=bincode): {err}"))
            }),
        }
    }
}

/// `<artifact>-<dataset>.ckpt`, the naming scheme pretrained artifacts have
/// always been stored under.
pub fn checkpoint_file_name(artifact_id: &str, dataset: &str) -> String {
    format!("{artifact_id}-{dataset}.{CHECKPOINT_EXTENSION}")
}

pub fn checkpoint_path(dir: &Path, artifact_id: &str, dataset: &str) -> PathBuf {
    dir.join(checkpoint_file_name(artifact_id, dataset))
}

/// Loads and fully validates one artifact envelope. A missing file is a
/// `MissingCheckpoint`; anything unreadable past that point is `Corrupt`.
pub fn load_artifact(
    dir: &Path,
    artifact_id: &str,
    dataset: &str,
) -> Result<CheckpointEnvelope, EvalError> {
    let path = checkpoint_path(dir, artifact_id, dataset);
    if !path.exists() {
        return Err(EvalError::missing_checkpoint(dataset, path));
    }

    let raw = fs::read(&path).map_err(|err| EvalError::io(&path, err))?;
    let envelope: CheckpointEnvelope = serde_json::from_slice(&raw).map_err(|err| {
        EvalError::corrupt(format!(
            "checkpoint envelope parse failed at {}: {err}",
            path.display()
        ))
    })?;

    if envelope.artifact_id != artifact_id {
        return Err(EvalError::corrupt(format!(
            "checkpoint artifact mismatch at {}: expected `{artifact_id}`, found `{}`",
            path.display(),
            envelope.artifact_id
        )));
    }
    if envelope.dataset != dataset {
        return Err(EvalError::corrupt(format!(
            "checkpoint dataset mismatch at {}: expected `{dataset}`, found `{}`",
            path.display(),
            envelope.dataset
        )));
    }
    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;
    Ok(envelope)
}

/// Writes an envelope to its canonical path under `dir`, creating the
/// directory when needed.
pub fn store_artifact(dir: &Path, envelope: &CheckpointEnvelope) -> Result<PathBuf, EvalError> {
    envelope.validate_metadata()?;
    envelope.verify_payload_crc32()?;

    fs::create_dir_all(dir).map_err(|err| EvalError::io(dir, err))?;
    let path = checkpoint_path(dir, &envelope.artifact_id, &envelope.dataset);
    let encoded = serde_json::to_vec(envelope)
        .map_err(|err| EvalError::corrupt(format!("envelope serialization failed: {err}")))?;
    fs::write(&path, encoded).map_err(|err| EvalError::io(&path, err))?;
    Ok(path)
}
