//! Seams to the external collaborators the pipeline depends on but never
//! implements: key management and authorization. The pipeline consumes a key
//! handle (never generates root keys) and receives allow/deny decisions for
//! a trusted actor identifier.

use crate::cipher::KeyHandle;
use crate::error::PipelineError;
use crate::finding::Classification;
use async_trait::async_trait;

/// Resolves a logical key id to a usable key handle. Backed by the external
/// KMS in production; `StaticKeyProvider` serves tests and single-node use.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn key_for(&self, key_id: &str) -> Result<KeyHandle, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Evaluates whether `actor` may read content at `classification`.
#[async_trait]
pub trait AccessEvaluator: Send + Sync {
    async fn authorize(
        &self,
        actor: &str,
        classification: Classification,
    ) -> Result<AccessDecision, PipelineError>;
}

/// Key provider over a fixed in-memory key. The material is supplied at
/// construction (e.g. decoded from an environment secret by the host) and is
/// never logged.
pub struct StaticKeyProvider {
    version: u16,
    material: [u8; 32],
}

impl StaticKeyProvider {
    pub fn new(version: u16, material: [u8; 32]) -> Self {
        Self { version, material }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn key_for(&self, key_id: &str) -> Result<KeyHandle, PipelineError> {
        Ok(KeyHandle::new(key_id, self.version, self.material))
    }
}

/// Evaluator that grants every actor up to a fixed ceiling. Actors are
/// denied anything above it; useful for tests and single-tenant setups.
pub struct CeilingAccessEvaluator {
    ceiling: Classification,
}

impl CeilingAccessEvaluator {
    pub fn new(ceiling: Classification) -> Self {
        Self { ceiling }
    }
}

#[async_trait]
impl AccessEvaluator for CeilingAccessEvaluator {
    async fn authorize(
        &self,
        _actor: &str,
        classification: Classification,
    ) -> Result<AccessDecision, PipelineError> {
        if classification <= self.ceiling {
            Ok(AccessDecision::Allow)
        } else {
            Ok(AccessDecision::Deny)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check: the seams must stay object-safe.
    fn _assert_object_safe(_: &dyn KeyProvider, _: &dyn AccessEvaluator) {}

    #[tokio::test]
    async fn static_provider_hands_out_versioned_keys() {
        let provider = StaticKeyProvider::new(3, [7u8; 32]);
        let handle = provider.key_for("warden-payload").await.unwrap();
        assert_eq!(handle.version, 3);
        assert_eq!(handle.key_id, "warden-payload");
    }

    #[tokio::test]
    async fn ceiling_evaluator_denies_above_ceiling() {
        let eval = CeilingAccessEvaluator::new(Classification::Internal);
        assert_eq!(
            eval.authorize("alice", Classification::Internal).await.unwrap(),
            AccessDecision::Allow
        );
        assert_eq!(
            eval.authorize("alice", Classification::Sensitive).await.unwrap(),
            AccessDecision::Deny
        );
    }
}
