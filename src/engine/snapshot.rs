//! Checkpoint snapshots of an execution context
//!
//! A snapshot is the context serialized to JSON plus a SHA-256 digest of that
//! payload. Restoring verifies the digest before deserializing, so a
//! truncated or edited checkpoint is rejected instead of silently resuming a
//! corrupted run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::workflow::context::ExecutionContext;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),
}

/// Opaque, checksummed copy of a run's context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    version: u32,
    run_id: String,
    day: NaiveDate,
    digest: String,
    payload: String,
}

impl ContextSnapshot {
    pub fn capture(ctx: &ExecutionContext) -> Result<Self, SnapshotError> {
        let payload = serde_json::to_string(ctx)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            run_id: ctx.run_id().to_string(),
            day: ctx.day(),
            digest: digest(&payload),
            payload,
        })
    }

    /// Rebuild the context after verifying the payload digest
    pub fn restore(&self) -> Result<ExecutionContext, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        let actual = digest(&self.payload);
        if actual != self.digest {
            return Err(SnapshotError::DigestMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(serde_json::from_str(&self.payload)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Day the context was positioned on when captured
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Hex SHA-256 of the payload
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn digest(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
