//! warden-core: secure ingestion pipeline between raw text and durable
//! storage.
//!
//! Raw content flows through PII redaction, secret scanning, sensitivity
//! classification, tier-gated encryption, and an append-only audit ledger
//! before anything touches disk. The pipeline fails closed: detected
//! secrets block the store, unauthorized reads are denied and audited, and
//! an event that cannot be durably audited fails the operation that
//! produced it.

mod audit;
mod cipher;
mod classifier;
mod collaborators;
mod config;
mod error;
mod finding;
mod pipeline;
mod redactor;
mod scanner;
mod secure_memory;
mod store;

// Findings and classification tiers
pub use finding::{
    content_digest, Classification, ClassificationLabel, Finding, ScrubResult, Severity,
    SeverityCounts, Span,
};

// Stage components
pub use classifier::{Classifier, ClassifierConfig};
pub use redactor::{Redactor, RedactorConfig, SENSITIVE_PII_KINDS};
pub use scanner::{shannon_entropy, EntropyConfig, SecretScanner, ENTROPY_PATTERN_ID};

// Encryption
pub use cipher::{decrypt, encrypt, CipherError, EncryptedBlob, KeyHandle};
pub use secure_memory::LockedBuf;

// Audit ledger
pub use audit::{
    AuditAction, AuditEvent, AuditLog, AuditOutcome, AuditQuery, AuditWriteError, ChainStatus,
    CHAIN_ROOT_DIGEST,
};

// Persistence
pub use store::{Payload, RecordLookup, RecordMetadata, RecordStore, StoredRecord};

// Orchestration
pub use config::{PipelineConfig, RetentionPolicy, SENSITIVE_RETENTION_FLOOR_DAYS};
pub use error::PipelineError;
pub use pipeline::{BlockSummary, Pipeline, StoreOutcome, StoreReceipt};

// External collaborator seams (KMS, authorization)
pub use collaborators::{
    AccessDecision, AccessEvaluator, CeilingAccessEvaluator, KeyProvider, StaticKeyProvider,
};
