//! Sled-backed record persistence.
//!
//! Two trees: `records` holds serialized `StoredRecord`s keyed by uuid,
//! `tombstones` holds purge markers. A record write is a single insert
//! followed by a flush — either the whole record lands or nothing does.
//! Purge writes the tombstone first, flushes, then removes the payload, so
//! a concurrent read observes the payload as present or as purged, never
//! half-deleted.

use crate::cipher::EncryptedBlob;
use crate::error::PipelineError;
use crate::finding::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use uuid::Uuid;

const RECORDS_TREE: &str = "records";
const TOMBSTONES_TREE: &str = "tombstones";

/// Payload of a stored record. Ciphertext if and only if the record is
/// classified Sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Payload {
    Plain { text: String },
    Encrypted { blob: EncryptedBlob },
}

impl Payload {
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted { .. })
    }
}

/// Caller-supplied metadata for a record: what kind of content this is, plus
/// free-form extras.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl RecordMetadata {
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            extra: serde_json::Value::Null,
        }
    }
}

/// A persisted record. Owned exclusively by this store; its lifecycle ends
/// at retention expiry via purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub classification: Classification,
    pub created_at: DateTime<Utc>,
    pub retention_expires_at: DateTime<Utc>,
    pub payload: Payload,
    pub metadata: RecordMetadata,
}

/// What a `get` observed for an id.
#[derive(Debug)]
pub enum RecordLookup {
    Present(Box<StoredRecord>),
    /// Payload removed by the retention job; the id was once valid.
    Purged,
    Missing,
}

pub struct RecordStore {
    db: Db,
}

impl RecordStore {
    /// Opens or creates the record database at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn records(&self) -> Result<sled::Tree, PipelineError> {
        Ok(self.db.open_tree(RECORDS_TREE)?)
    }

    fn tombstones(&self) -> Result<sled::Tree, PipelineError> {
        Ok(self.db.open_tree(TOMBSTONES_TREE)?)
    }

    /// Atomic commit: serialize, insert, flush. A cancelled or crashed store
    /// operation before this call leaves no trace; after it, the full record
    /// is durable.
    pub fn put(&self, record: &StoredRecord) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| PipelineError::Storage(format!("serialize record: {e}")))?;
        self.records()?
            .insert(record.id.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Looks up a record, tombstones first: a purged payload is reported as
    /// `Purged`, never returned half-deleted.
    pub fn get(&self, id: Uuid) -> Result<RecordLookup, PipelineError> {
        if self.tombstones()?.get(id.as_bytes())?.is_some() {
            return Ok(RecordLookup::Purged);
        }
        match self.records()?.get(id.as_bytes())? {
            Some(bytes) => {
                let record: StoredRecord = serde_json::from_slice(&bytes)
                    .map_err(|e| PipelineError::Storage(format!("deserialize record: {e}")))?;
                Ok(RecordLookup::Present(Box::new(record)))
            }
            None => Ok(RecordLookup::Missing),
        }
    }

    /// Records whose retention window has closed as of `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Result<Vec<StoredRecord>, PipelineError> {
        let mut out = Vec::new();
        for item in self.records()?.iter() {
            let (_, bytes) = item?;
            let record: StoredRecord = serde_json::from_slice(&bytes)
                .map_err(|e| PipelineError::Storage(format!("deserialize record: {e}")))?;
            if record.retention_expires_at < now {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Purges a record's payload: tombstone first (flushed), then removal.
    /// The audit trail for the record is untouched — that lives in the ledger.
    pub fn purge(&self, id: Uuid) -> Result<(), PipelineError> {
        self.tombstones()?
            .insert(id.as_bytes(), Utc::now().to_rfc3339().as_bytes())?;
        self.db.flush()?;
        self.records()?.remove(id.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Removes a record without leaving a tombstone. Used only to roll back
    /// a commit whose audit append failed — the record must vanish without
    /// trace so the store operation can fail cleanly.
    pub fn rollback(&self, id: Uuid) -> Result<(), PipelineError> {
        self.records()?.remove(id.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: Uuid) -> StoredRecord {
        let now = Utc::now();
        StoredRecord {
            id,
            classification: Classification::Internal,
            created_at: now,
            retention_expires_at: now + chrono::Duration::days(30),
            payload: Payload::Plain {
                text: "sanitized content".to_string(),
            },
            metadata: RecordMetadata::of_kind("note"),
        }
    }

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_path(dir.path()).unwrap();
        let id = Uuid::new_v4();
        store.put(&sample(id)).unwrap();
        match store.get(id).unwrap() {
            RecordLookup::Present(record) => assert_eq!(record.id, id),
            other => panic!("expected Present, got {other:?}"),
        }
    }

    #[test]
    fn missing_record_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_path(dir.path()).unwrap();
        assert!(matches!(
            store.get(Uuid::new_v4()).unwrap(),
            RecordLookup::Missing
        ));
    }

    #[test]
    fn purge_leaves_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_path(dir.path()).unwrap();
        let id = Uuid::new_v4();
        store.put(&sample(id)).unwrap();
        store.purge(id).unwrap();
        assert!(matches!(store.get(id).unwrap(), RecordLookup::Purged));
    }

    #[test]
    fn rollback_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_path(dir.path()).unwrap();
        let id = Uuid::new_v4();
        store.put(&sample(id)).unwrap();
        store.rollback(id).unwrap();
        assert!(matches!(store.get(id).unwrap(), RecordLookup::Missing));
    }

    #[test]
    fn expired_scan_filters_by_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_path(dir.path()).unwrap();
        let fresh = Uuid::new_v4();
        store.put(&sample(fresh)).unwrap();
        let stale = Uuid::new_v4();
        let mut record = sample(stale);
        record.retention_expires_at = Utc::now() - chrono::Duration::days(1);
        store.put(&record).unwrap();
        let expired = store.expired(Utc::now()).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale);
    }
}
