//! Pipeline configuration loaded from the environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | WARDEN_BLOCK_ON_SECRETS | true | Fail-closed store when secrets ≥ the severity floor are found. |
//! | WARDEN_BLOCK_SEVERITY_FLOOR | high | low \| medium \| high \| critical — minimum severity that blocks. |
//! | WARDEN_COLLABORATOR_TIMEOUT_MS | 5000 | Bounded timeout for KMS / authorization calls. |
//! | WARDEN_AUDIT_SEGMENT_BYTES | 16777216 | Audit segment rotation threshold. |
//! | WARDEN_RETENTION_PUBLIC_DAYS | 30 | Minimum retention for Public records. |
//! | WARDEN_RETENTION_INTERNAL_DAYS | 60 | Minimum retention for Internal records. |
//! | WARDEN_RETENTION_SENSITIVE_DAYS | 90 | Minimum retention for Sensitive records (regulatory floor 90). |
//!
//! Misconfiguration is rejected here, at load time — never at purge time.

use crate::error::PipelineError;
use crate::finding::{Classification, Severity};
use serde::{Deserialize, Serialize};

/// Regulatory floor for Sensitive retention, in days.
pub const SENSITIVE_RETENTION_FLOOR_DAYS: u32 = 90;

/// Minimum retention days per classification tier. Consulted by the
/// orchestrator when stamping `retention_expires_at` and by the purge job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub public_days: u32,
    pub internal_days: u32,
    pub sensitive_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            public_days: 30,
            internal_days: 60,
            sensitive_days: SENSITIVE_RETENTION_FLOOR_DAYS,
        }
    }
}

impl RetentionPolicy {
    /// Rejects policies below the regulatory floor or with zero windows.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sensitive_days < SENSITIVE_RETENTION_FLOOR_DAYS {
            return Err(PipelineError::RetentionPolicy(format!(
                "sensitive retention {} days is below the {SENSITIVE_RETENTION_FLOOR_DAYS}-day floor",
                self.sensitive_days
            )));
        }
        if self.public_days == 0 || self.internal_days == 0 {
            return Err(PipelineError::RetentionPolicy(
                "retention windows must be at least one day".to_string(),
            ));
        }
        Ok(())
    }

    pub fn days_for(&self, classification: Classification) -> u32 {
        match classification {
            Classification::Public => self.public_days,
            Classification::Internal => self.internal_days,
            Classification::Sensitive => self.sensitive_days,
        }
    }
}

/// Top-level pipeline configuration. Constructed once and passed by value
/// into the orchestrator — no process-wide singleton state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// When true, a store with secret findings at or above
    /// `block_severity_floor` terminates Blocked and persists nothing.
    pub block_on_secrets: bool,
    pub block_severity_floor: Severity,
    /// Bounded timeout for external collaborator calls (KMS, authorization).
    pub collaborator_timeout_ms: u64,
    /// Audit segment rotation threshold in bytes.
    pub audit_segment_bytes: u64,
    /// Logical key id requested from the key provider for Sensitive payloads.
    pub payload_key_id: String,
    pub retention: RetentionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_on_secrets: true,
            block_severity_floor: Severity::High,
            collaborator_timeout_ms: 5_000,
            audit_segment_bytes: 16 * 1024 * 1024,
            payload_key_id: "warden-payload".to_string(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from environment. Unset or invalid values fall back to defaults
    /// (see module docs); an out-of-policy retention window is an error.
    pub fn from_env() -> Result<Self, PipelineError> {
        let defaults = Self::default();
        let config = Self {
            block_on_secrets: env_bool("WARDEN_BLOCK_ON_SECRETS", true),
            block_severity_floor: env_severity(
                "WARDEN_BLOCK_SEVERITY_FLOOR",
                defaults.block_severity_floor,
            ),
            collaborator_timeout_ms: env_u64(
                "WARDEN_COLLABORATOR_TIMEOUT_MS",
                defaults.collaborator_timeout_ms,
            ),
            audit_segment_bytes: env_u64("WARDEN_AUDIT_SEGMENT_BYTES", defaults.audit_segment_bytes),
            payload_key_id: std::env::var("WARDEN_PAYLOAD_KEY_ID")
                .unwrap_or(defaults.payload_key_id),
            retention: RetentionPolicy {
                public_days: env_u32("WARDEN_RETENTION_PUBLIC_DAYS", 30),
                internal_days: env_u32("WARDEN_RETENTION_INTERNAL_DAYS", 60),
                sensitive_days: env_u32(
                    "WARDEN_RETENTION_SENSITIVE_DAYS",
                    SENSITIVE_RETENTION_FLOOR_DAYS,
                ),
            },
        };
        config.retention.validate()?;
        Ok(config)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_severity(key: &str, default: Severity) -> Severity {
    match std::env::var(key).map(|v| v.trim().to_lowercase()) {
        Ok(v) => match v.as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.block_on_secrets);
        assert_eq!(config.block_severity_floor, Severity::High);
        assert!(config.retention.validate().is_ok());
    }

    #[test]
    fn sensitive_retention_below_floor_rejected() {
        let policy = RetentionPolicy {
            sensitive_days: 30,
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PipelineError::RetentionPolicy(_))
        ));
    }

    #[test]
    fn zero_day_window_rejected() {
        let policy = RetentionPolicy {
            public_days: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn days_for_each_tier() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.days_for(Classification::Public), 30);
        assert_eq!(policy.days_for(Classification::Internal), 60);
        assert_eq!(policy.days_for(Classification::Sensitive), 90);
    }
}
