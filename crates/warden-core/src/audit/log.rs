//! Append-only, segmented, hash-chained JSONL audit ledger.
//!
//! One serialized event per line. Appends are serialized through a single
//! writer lock and fsync'd before `append` returns — if the event cannot be
//! made durable, the triggering operation must fail ("audit-or-fail").
//! When the active segment exceeds the size threshold a new segment is
//! opened; `query` transparently spans segments. Events are never mutated
//! or deleted.
//!
//! Tamper evidence: every event embeds `prev_digest`, the SHA-256 of the
//! previous event's serialized line. The chain crosses segment boundaries,
//! rooted at the all-zero digest, so a deleted or reordered line is
//! detectable via [`AuditLog::verify_chain`].

use super::event::{AuditEvent, AuditQuery};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Root of the chain: 64 zero hex chars.
pub const CHAIN_ROOT_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const SEGMENT_PREFIX: &str = "audit-";
const SEGMENT_SUFFIX: &str = ".jsonl";

/// Durable-append failures. Escalated to fail the triggering operation.
#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("audit ledger I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit event serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a chain verification walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// Every line's `prev_digest` matches the digest of its predecessor.
    Intact { events: usize },
    /// First break found: segment sequence number and 0-based line index.
    Broken { segment: u64, line: usize },
}

struct Writer {
    file: File,
    segment_seq: u64,
    segment_bytes: u64,
    last_digest: String,
    last_timestamp: Option<DateTime<Utc>>,
}

/// The ledger. Cheap to share behind an `Arc`; the writer lock enforces
/// single-writer discipline per segment while queries scan segment files
/// independently.
pub struct AuditLog {
    dir: PathBuf,
    max_segment_bytes: u64,
    writer: Mutex<Writer>,
}

fn line_digest(line: &str) -> String {
    let digest = Sha256::digest(line.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn segment_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("{SEGMENT_PREFIX}{seq:06}{SEGMENT_SUFFIX}"))
}

/// Segment sequence numbers present in `dir`, ascending.
fn list_segments(dir: &Path) -> Result<Vec<u64>, std::io::Error> {
    let mut seqs = Vec::new();
    if !dir.exists() {
        return Ok(seqs);
    }
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name
            .strip_prefix(SEGMENT_PREFIX)
            .and_then(|s| s.strip_suffix(SEGMENT_SUFFIX))
        {
            if let Ok(seq) = stem.parse::<u64>() {
                seqs.push(seq);
            }
        }
    }
    seqs.sort_unstable();
    Ok(seqs)
}

impl AuditLog {
    /// Opens (or creates) the ledger at `dir`. Recovers the chain tail —
    /// last digest and last timestamp — from the newest segment so appends
    /// continue the chain across restarts.
    pub fn open(dir: impl Into<PathBuf>, max_segment_bytes: u64) -> Result<Self, AuditWriteError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let seqs = list_segments(&dir)?;
        let segment_seq = seqs.last().copied().unwrap_or(1);
        let path = segment_path(&dir, segment_seq);

        let mut last_digest = CHAIN_ROOT_DIGEST.to_string();
        let mut last_timestamp = None;
        let mut segment_bytes = 0u64;
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            segment_bytes = contents.len() as u64;
            if let Some(line) = contents.lines().last() {
                last_digest = line_digest(line);
                if let Ok(event) = serde_json::from_str::<AuditEvent>(line) {
                    last_timestamp = Some(event.timestamp);
                }
            } else if segment_seq > 1 {
                // Empty active segment after rotation: chain tail lives in
                // the previous segment.
                let prev = fs::read_to_string(segment_path(&dir, segment_seq - 1))?;
                if let Some(line) = prev.lines().last() {
                    last_digest = line_digest(line);
                }
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!(
            target: "warden::audit",
            segment = segment_seq,
            bytes = segment_bytes,
            "audit ledger opened"
        );
        Ok(Self {
            dir,
            max_segment_bytes,
            writer: Mutex::new(Writer {
                file,
                segment_seq,
                segment_bytes,
                last_digest,
                last_timestamp,
            }),
        })
    }

    /// Durably appends one event: chains its digest, clamps its timestamp to
    /// keep per-ledger monotonic ordering, writes the line, and fsyncs.
    /// Any failure here must fail the operation that produced the event.
    pub fn append(&self, mut event: AuditEvent) -> Result<(), AuditWriteError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last_ts) = writer.last_timestamp {
            if event.timestamp < last_ts {
                event.timestamp = last_ts;
            }
        }
        event.prev_digest = writer.last_digest.clone();
        let line = serde_json::to_string(&event)?;
        writer.file.write_all(line.as_bytes())?;
        writer.file.write_all(b"\n")?;
        writer.file.sync_data()?;

        writer.last_digest = line_digest(&line);
        writer.last_timestamp = Some(event.timestamp);
        writer.segment_bytes += line.len() as u64 + 1;
        if writer.segment_bytes >= self.max_segment_bytes {
            let next_seq = writer.segment_seq + 1;
            let next = OpenOptions::new()
                .create(true)
                .append(true)
                .open(segment_path(&self.dir, next_seq))?;
            writer.file = next;
            writer.segment_seq = next_seq;
            writer.segment_bytes = 0;
            tracing::info!(
                target: "warden::audit",
                segment = next_seq,
                "audit segment rotated"
            );
        }
        Ok(())
    }

    /// Scans every segment in order and returns events matching `filter`.
    /// Reads do not take the writer lock; appends are line-atomic (fsync'd
    /// whole lines), so a concurrent scan sees a clean prefix.
    pub fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditEvent>, AuditWriteError> {
        let mut events = Vec::new();
        for seq in list_segments(&self.dir)? {
            let contents = fs::read_to_string(segment_path(&self.dir, seq))?;
            for line in contents.lines() {
                match serde_json::from_str::<AuditEvent>(line) {
                    Ok(event) => {
                        if filter.matches(&event) {
                            events.push(event);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "warden::audit",
                            segment = seq,
                            error = %e,
                            "skipping unparsable ledger line"
                        );
                    }
                }
            }
        }
        Ok(events)
    }

    /// Walks the full chain across segments, recomputing digests. Detects
    /// deleted, reordered, or edited lines.
    pub fn verify_chain(&self) -> Result<ChainStatus, AuditWriteError> {
        let mut expected = CHAIN_ROOT_DIGEST.to_string();
        let mut events = 0usize;
        for seq in list_segments(&self.dir)? {
            let contents = fs::read_to_string(segment_path(&self.dir, seq))?;
            for (idx, line) in contents.lines().enumerate() {
                let parsed: AuditEvent = match serde_json::from_str(line) {
                    Ok(e) => e,
                    Err(_) => {
                        return Ok(ChainStatus::Broken { segment: seq, line: idx });
                    }
                };
                if parsed.prev_digest != expected {
                    return Ok(ChainStatus::Broken { segment: seq, line: idx });
                }
                expected = line_digest(line);
                events += 1;
            }
        }
        Ok(ChainStatus::Intact { events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::{AuditAction, AuditOutcome};

    fn event(actor: &str) -> AuditEvent {
        AuditEvent::now(actor, AuditAction::Store, AuditOutcome::Success)
    }

    #[test]
    fn append_and_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
        log.append(event("alice")).unwrap();
        log.append(event("bob")).unwrap();
        let all = log.query(&AuditQuery::default()).unwrap();
        assert_eq!(all.len(), 2);
        let alice_only = log
            .query(&AuditQuery {
                actor: Some("alice".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(alice_only.len(), 1);
    }

    #[test]
    fn chain_is_intact_and_rooted() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
        for i in 0..5 {
            log.append(event(&format!("actor-{i}"))).unwrap();
        }
        assert_eq!(log.verify_chain().unwrap(), ChainStatus::Intact { events: 5 });
        let first = &log.query(&AuditQuery::default()).unwrap()[0];
        assert_eq!(first.prev_digest, CHAIN_ROOT_DIGEST);
    }

    #[test]
    fn deleted_line_breaks_chain() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
        for i in 0..3 {
            log.append(event(&format!("actor-{i}"))).unwrap();
        }
        // Remove the middle line out-of-band.
        let path = segment_path(dir.path(), 1);
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        fs::write(&path, format!("{}\n{}\n", lines[0], lines[2])).unwrap();
        assert_eq!(
            log.verify_chain().unwrap(),
            ChainStatus::Broken { segment: 1, line: 1 }
        );
    }

    #[test]
    fn rotation_spans_query_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        // Tiny threshold: every append rotates.
        let log = AuditLog::open(dir.path(), 64).unwrap();
        for i in 0..4 {
            log.append(event(&format!("actor-{i}"))).unwrap();
        }
        let seqs = list_segments(dir.path()).unwrap();
        assert!(seqs.len() > 1, "expected rotation, got {seqs:?}");
        assert_eq!(log.query(&AuditQuery::default()).unwrap().len(), 4);
        assert_eq!(log.verify_chain().unwrap(), ChainStatus::Intact { events: 4 });
    }

    #[test]
    fn chain_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
            log.append(event("alice")).unwrap();
        }
        let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
        log.append(event("bob")).unwrap();
        assert_eq!(log.verify_chain().unwrap(), ChainStatus::Intact { events: 2 });
    }

    #[test]
    fn timestamps_are_monotonic_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path(), 1024 * 1024).unwrap();
        // Simulate a clock regression by pre-dating the second event.
        log.append(event("alice")).unwrap();
        let mut stale = event("bob");
        stale.timestamp = stale.timestamp - chrono::Duration::hours(1);
        log.append(stale).unwrap();
        let all = log.query(&AuditQuery::default()).unwrap();
        assert!(all[0].timestamp <= all[1].timestamp);
    }
}
