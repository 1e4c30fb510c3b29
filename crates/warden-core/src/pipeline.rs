//! The orchestrator: sequences scrub → scan → classify → encrypt → persist
//! → audit as one atomic store operation, and the mirror-image read path.
//!
//! Terminal states per operation: Stored, Blocked, Denied, Failed. Blocked
//! is a value, not an error — errors are reserved for I/O, crypto, and audit
//! failures. Every terminal state except Failed-before-side-effects appends
//! exactly one audit event, and an event that cannot be durably appended
//! fails the operation that produced it ("audit-or-fail"): for a store, the
//! just-committed record is rolled back so no un-audited record survives.
//!
//! Collaborator calls (key provider, authorization evaluator) run under a
//! bounded timeout; a timeout is a hard failure, never read as "no secrets"
//! or "allowed". Blocked/denied/failed outcomes are terminal — retries
//! belong to the caller.

use crate::audit::{AuditAction, AuditEvent, AuditLog, AuditOutcome, AuditQuery};
use crate::cipher;
use crate::classifier::Classifier;
use crate::collaborators::{AccessDecision, AccessEvaluator, KeyProvider};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::finding::{Classification, SeverityCounts};
use crate::redactor::Redactor;
use crate::scanner::SecretScanner;
use crate::store::{Payload, RecordLookup, RecordMetadata, RecordStore, StoredRecord};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What a successful store returns to the caller.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreReceipt {
    pub id: Uuid,
    pub classification: Classification,
    pub created_at: chrono::DateTime<Utc>,
    pub retention_expires_at: chrono::DateTime<Utc>,
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_version: Option<u16>,
}

/// Summary a blocked store exposes: severity counts, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockSummary {
    pub counts: SeverityCounts,
}

/// Terminal result of a store operation.
#[derive(Debug)]
pub enum StoreOutcome {
    Stored(StoreReceipt),
    Blocked(BlockSummary),
}

impl StoreOutcome {
    /// Convert Blocked into `PipelineError::SecretsDetected` for callers
    /// that prefer `?` over matching.
    pub fn into_result(self) -> Result<StoreReceipt, PipelineError> {
        match self {
            Self::Stored(receipt) => Ok(receipt),
            Self::Blocked(summary) => Err(PipelineError::SecretsDetected {
                counts: summary.counts,
            }),
        }
    }
}

/// The secure ingestion pipeline. One instance owns its stage components and
/// its stores; construct it once and share behind an `Arc` — store/read
/// calls for distinct records run fully in parallel.
pub struct Pipeline {
    config: PipelineConfig,
    redactor: Redactor,
    scanner: SecretScanner,
    classifier: Classifier,
    records: RecordStore,
    audit: Arc<AuditLog>,
    keys: Arc<dyn KeyProvider>,
    access: Arc<dyn AccessEvaluator>,
    /// Reads currently holding a record. The purge job defers records with
    /// an in-flight read to its next run.
    in_flight_reads: DashMap<Uuid, usize>,
}

/// RAII marker for an in-flight read; see `Pipeline::in_flight_reads`.
struct ReadMarker<'a> {
    map: &'a DashMap<Uuid, usize>,
    id: Uuid,
}

impl<'a> ReadMarker<'a> {
    fn enter(map: &'a DashMap<Uuid, usize>, id: Uuid) -> Self {
        *map.entry(id).or_insert(0) += 1;
        Self { map, id }
    }
}

impl Drop for ReadMarker<'_> {
    fn drop(&mut self) {
        // The get_mut guard must drop before remove_if takes the shard lock.
        if let Some(mut n) = self.map.get_mut(&self.id) {
            *n = n.saturating_sub(1);
        }
        self.map.remove_if(&self.id, |_, n| *n == 0);
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        redactor: Redactor,
        scanner: SecretScanner,
        classifier: Classifier,
        records: RecordStore,
        audit: AuditLog,
        keys: Arc<dyn KeyProvider>,
        access: Arc<dyn AccessEvaluator>,
    ) -> Result<Self, PipelineError> {
        config.retention.validate()?;
        Ok(Self {
            config,
            redactor,
            scanner,
            classifier,
            records,
            audit: Arc::new(audit),
            keys,
            access,
            in_flight_reads: DashMap::new(),
        })
    }

    /// The ledger, for direct queries and chain verification.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let ms = self.config.collaborator_timeout_ms;
        tokio::time::timeout(Duration::from_millis(ms), fut)
            .await
            .map_err(|_| PipelineError::Timeout(ms))?
    }

    /// Ingest `content` for `actor`. See the module docs for the state
    /// machine; the persistence write is the commit point — cancellation
    /// before it leaves no trace.
    pub async fn store(
        &self,
        content: &str,
        actor: &str,
        metadata: RecordMetadata,
        caller_hint: Option<Classification>,
    ) -> Result<StoreOutcome, PipelineError> {
        let scrub = self.redactor.scrub(content);
        let secret_findings = self.scanner.detect(&scrub.sanitized_text);
        let counts = SeverityCounts::tally(&secret_findings);

        if self.config.block_on_secrets
            && counts.at_or_above(self.config.block_severity_floor) > 0
        {
            // Fail closed: nothing persisted, one blocked audit event.
            self.audit.append(
                AuditEvent::now(actor, AuditAction::Blocked, AuditOutcome::Blocked)
                    .with_counts(scrub.pii_findings.len(), secret_findings.len()),
            )?;
            tracing::warn!(
                target: "warden::pipeline",
                actor,
                secret_count = secret_findings.len(),
                "store blocked: secrets at or above severity floor"
            );
            return Ok(StoreOutcome::Blocked(BlockSummary { counts }));
        }

        let label = self
            .classifier
            .classify(&scrub, &secret_findings, caller_hint)?;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let retention_days = self.config.retention.days_for(label.tier);
        let retention_expires_at = created_at + ChronoDuration::days(i64::from(retention_days));

        let (payload, key_version) = if label.tier == Classification::Sensitive {
            let handle = self
                .bounded(self.keys.key_for(&self.config.payload_key_id))
                .await?;
            let blob = cipher::encrypt(scrub.sanitized_text.as_bytes(), &handle)?;
            let version = blob.key_version;
            (Payload::Encrypted { blob }, Some(version))
        } else {
            (
                Payload::Plain {
                    text: scrub.sanitized_text.clone(),
                },
                None,
            )
        };

        let record = StoredRecord {
            id,
            classification: label.tier,
            created_at,
            retention_expires_at,
            payload,
            metadata,
        };
        self.records.put(&record)?;

        // Audit-or-fail: an unrecorded store may not survive.
        let audit_result = self.audit.append(
            AuditEvent::now(actor, AuditAction::Store, AuditOutcome::Success)
                .with_classification(label.tier)
                .with_counts(scrub.pii_findings.len(), secret_findings.len())
                .with_record(id),
        );
        if let Err(e) = audit_result {
            self.records.rollback(id)?;
            return Err(e.into());
        }

        tracing::info!(
            target: "warden::pipeline",
            record_id = %id,
            classification = %label.tier,
            rationale = %label.rationale,
            encrypted = key_version.is_some(),
            "record stored"
        );
        Ok(StoreOutcome::Stored(StoreReceipt {
            id,
            classification: label.tier,
            created_at,
            retention_expires_at,
            encrypted: key_version.is_some(),
            key_version,
        }))
    }

    /// Authorize, decrypt if needed, audit, return the sanitized content.
    /// Denials are audited and surface as `PipelineError::Authorization`.
    pub async fn read(&self, record_id: Uuid, actor: &str) -> Result<String, PipelineError> {
        let record = match self.records.get(record_id)? {
            RecordLookup::Present(record) => *record,
            RecordLookup::Purged | RecordLookup::Missing => {
                return Err(PipelineError::RecordNotFound(record_id));
            }
        };
        let _marker = ReadMarker::enter(&self.in_flight_reads, record_id);

        let decision = self
            .bounded(self.access.authorize(actor, record.classification))
            .await?;
        if decision == AccessDecision::Deny {
            self.audit.append(
                AuditEvent::now(actor, AuditAction::Read, AuditOutcome::Denied)
                    .with_classification(record.classification)
                    .with_record(record_id),
            )?;
            return Err(PipelineError::Authorization {
                classification: record.classification,
            });
        }

        let content = match record.payload {
            Payload::Plain { text } => text,
            Payload::Encrypted { ref blob } => {
                let handle = self
                    .bounded(self.keys.key_for(&self.config.payload_key_id))
                    .await?;
                let locked = cipher::decrypt(blob, &handle)?;
                String::from_utf8(locked.as_slice().to_vec())
                    .map_err(|_| PipelineError::Encryption(cipher::CipherError::CorruptBlob))?
            }
        };

        self.audit.append(
            AuditEvent::now(actor, AuditAction::Read, AuditOutcome::Success)
                .with_classification(record.classification)
                .with_record(record_id),
        )?;
        Ok(content)
    }

    /// Retention purge pass, driven by the host's timer: removes payloads
    /// whose window closed as of `now`, each one audited *before* physical
    /// removal. Records with an in-flight read are deferred to the next run.
    /// Returns the number purged.
    pub async fn purge_expired(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        let mut purged = 0usize;
        for record in self.records.expired(now)? {
            if self.in_flight_reads.contains_key(&record.id) {
                tracing::debug!(
                    target: "warden::pipeline",
                    record_id = %record.id,
                    "purge deferred: read in flight"
                );
                continue;
            }
            // Terminal audit event lands before the payload disappears.
            self.audit.append(
                AuditEvent::now("retention-job", AuditAction::Purge, AuditOutcome::Success)
                    .with_classification(record.classification)
                    .with_record(record.id),
            )?;
            self.records.purge(record.id)?;
            purged += 1;
        }
        if purged > 0 {
            tracing::info!(target: "warden::pipeline", purged, "retention purge completed");
        }
        Ok(purged)
    }

    /// Ledger query passthrough.
    pub fn query_audit(&self, filter: &AuditQuery) -> Result<Vec<AuditEvent>, PipelineError> {
        Ok(self.audit.query(filter)?)
    }
}
