//! Append-only audit ledger: event schema and the segmented JSONL log.

mod event;
mod log;

pub use event::{AuditAction, AuditEvent, AuditOutcome, AuditQuery};
pub use log::{AuditLog, AuditWriteError, ChainStatus, CHAIN_ROOT_DIGEST};
