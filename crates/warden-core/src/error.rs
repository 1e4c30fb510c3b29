//! Typed errors crossing the pipeline boundary.
//!
//! None of these variants ever carries raw matched PII or secret text —
//! only counts, kinds, and severities.

use crate::audit::AuditWriteError;
use crate::cipher::CipherError;
use crate::finding::{Classification, SeverityCounts};
use uuid::Uuid;

/// Error taxonomy for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed input or configuration, rejected synchronously.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Secrets detected under a blocking policy. Carries per-severity counts
    /// only, never the matched values.
    #[error("secrets detected ({counts})")]
    SecretsDetected { counts: SeverityCounts },

    /// A caller hint attempted to lower the classification below the
    /// auto-detected floor.
    #[error("classification conflict: requested {requested}, floor {floor}")]
    ClassificationConflict {
        requested: Classification,
        floor: Classification,
    },

    /// Read denied by the external authorization evaluator.
    #[error("actor not authorized for {classification} content")]
    Authorization { classification: Classification },

    /// Encrypt/decrypt failure — fail closed, no partial plaintext.
    #[error(transparent)]
    Encryption(#[from] CipherError),

    /// The audit ledger could not durably record the event. The triggering
    /// operation fails with it ("audit-or-fail").
    #[error(transparent)]
    AuditWrite(#[from] AuditWriteError),

    /// Retention policy misconfiguration, rejected at load time.
    #[error("retention policy rejected: {0}")]
    RetentionPolicy(String),

    /// Persistence-layer failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// No record (or an already-purged record) under this id.
    #[error("record {0} not found")]
    RecordNotFound(Uuid),

    /// A collaborator call (key provider, authorization evaluator) exceeded
    /// its bounded timeout. Hard failure; never reinterpreted as success.
    #[error("collaborator call timed out after {0} ms")]
    Timeout(u64),
}

impl From<sled::Error> for PipelineError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
