use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{AttemptId, ExerciseId};

/// Bumped whenever the encoded draft layout changes; older blobs are discarded.
pub const DRAFT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DraftError {
    #[error("draft is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("draft format version {found} is not supported (expected {DRAFT_FORMAT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("draft belongs to attempt {found}, not {expected}")]
    WrongAttempt {
        expected: AttemptId,
        found: AttemptId,
    },
}

/// Client-local snapshot of an in-progress attempt.
///
/// Always written whole; a newer snapshot fully replaces an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    attempt_id: AttemptId,
    answers: BTreeMap<ExerciseId, Value>,
    time_spent: BTreeMap<ExerciseId, u64>,
    pointer: usize,
    saved_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    draft: Draft,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    draft: &'a Draft,
}

impl Draft {
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        answers: BTreeMap<ExerciseId, Value>,
        time_spent: BTreeMap<ExerciseId, u64>,
        pointer: usize,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            answers,
            time_spent,
            pointer,
            saved_at,
        }
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<ExerciseId, Value> {
        &self.answers
    }

    #[must_use]
    pub fn time_spent(&self) -> &BTreeMap<ExerciseId, u64> {
        &self.time_spent
    }

    #[must_use]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    #[must_use]
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    /// Keep only the answers `keep` accepts; returns the IDs that were dropped.
    pub fn retain_answers(
        &mut self,
        mut keep: impl FnMut(ExerciseId, &Value) -> bool,
    ) -> Vec<ExerciseId> {
        let mut dropped = Vec::new();
        self.answers.retain(|id, response| {
            let kept = keep(*id, response);
            if !kept {
                dropped.push(*id);
            }
            kept
        });
        dropped
    }

    /// Serialize into a versioned blob for a draft store.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::Corrupt` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, DraftError> {
        Ok(serde_json::to_vec(&EnvelopeRef {
            version: DRAFT_FORMAT_VERSION,
            draft: self,
        })?)
    }

    /// Decode a blob and check it belongs to `expected`.
    ///
    /// # Errors
    ///
    /// Returns `DraftError` if the blob is corrupt, from another format
    /// version, or scoped to a different attempt.
    pub fn decode(bytes: &[u8], expected: AttemptId) -> Result<Self, DraftError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        if envelope.version != DRAFT_FORMAT_VERSION {
            return Err(DraftError::UnsupportedVersion {
                found: envelope.version,
            });
        }
        if envelope.draft.attempt_id != expected {
            return Err(DraftError::WrongAttempt {
                expected,
                found: envelope.draft.attempt_id,
            });
        }
        Ok(envelope.draft)
    }
}
