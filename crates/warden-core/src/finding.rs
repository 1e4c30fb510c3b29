//! Findings produced by the Redactor and the SecretScanner.
//!
//! A `Finding` records *what* matched and *where* — never the matched text
//! itself. The raw value is hashed (SHA-256) at creation for correlation and
//! dedup, then discarded. Findings are immutable once created.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Severity preassigned to secret patterns and entropy hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Byte-offset span into the *original* text of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the two spans share at least one byte.
    #[inline]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Non-reversible digest of matched text, keyed by the pattern that found it.
///
/// The pattern id is mixed in so identical raw values found by different
/// patterns dedupe independently.
pub fn content_digest(pattern_id: &str, matched: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pattern_id.as_bytes());
    hasher.update(b":");
    hasher.update(matched.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A single detection result. Tagged union: PII matches come from the
/// Redactor, secret matches from the SecretScanner.
///
/// Invariant: no variant ever carries the raw matched value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Pii {
        /// Built-in or custom pattern id (e.g. "email", "national_id").
        pattern_id: String,
        span: Span,
        content_hash: String,
    },
    Secret {
        /// Credential shape id (e.g. "stripe_secret_key") or "entropy".
        pattern_id: String,
        span: Span,
        severity: Severity,
        content_hash: String,
    },
}

impl Finding {
    pub fn pii(pattern_id: impl Into<String>, span: Span, matched: &str) -> Self {
        let pattern_id = pattern_id.into();
        let content_hash = content_digest(&pattern_id, matched);
        Self::Pii {
            pattern_id,
            span,
            content_hash,
        }
    }

    pub fn secret(
        pattern_id: impl Into<String>,
        span: Span,
        severity: Severity,
        matched: &str,
    ) -> Self {
        let pattern_id = pattern_id.into();
        let content_hash = content_digest(&pattern_id, matched);
        Self::Secret {
            pattern_id,
            span,
            severity,
            content_hash,
        }
    }

    #[inline]
    pub fn span(&self) -> Span {
        match self {
            Self::Pii { span, .. } | Self::Secret { span, .. } => *span,
        }
    }

    #[inline]
    pub fn pattern_id(&self) -> &str {
        match self {
            Self::Pii { pattern_id, .. } | Self::Secret { pattern_id, .. } => pattern_id,
        }
    }

    /// Severity of a secret finding; PII findings carry none.
    #[inline]
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Pii { .. } => None,
            Self::Secret { severity, .. } => Some(*severity),
        }
    }

    #[inline]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret { .. })
    }
}

/// Output of a single `Redactor::scrub` call. Consumed immediately by the
/// orchestrator; never persisted.
#[derive(Debug, Clone)]
pub struct ScrubResult {
    /// Input text with every PII match replaced by its placeholder token.
    pub sanitized_text: String,
    /// Findings in span order, offsets into the original text.
    pub pii_findings: Vec<Finding>,
}

impl ScrubResult {
    /// True if any finding came from one of the given pattern ids.
    pub fn has_any_kind(&self, pattern_ids: &[&str]) -> bool {
        self.pii_findings
            .iter()
            .any(|f| pattern_ids.contains(&f.pattern_id()))
    }
}

/// Sensitivity tier governing encryption, retention, and read authorization.
///
/// Ordered: `Public < Internal < Sensitive`. A caller hint may raise the tier
/// above the auto-detected floor, never lower it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Public,
    Internal,
    Sensitive,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Internal => write!(f, "internal"),
            Self::Sensitive => write!(f, "sensitive"),
        }
    }
}

/// Classification tier plus the rationale that produced it
/// (e.g. "national-ID pattern matched", "caller override").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationLabel {
    pub tier: Classification,
    pub rationale: String,
}

/// Per-severity counts of secret findings. The only detail a blocked store
/// operation exposes to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity() {
                Some(Severity::Low) => counts.low += 1,
                Some(Severity::Medium) => counts.medium += 1,
                Some(Severity::High) => counts.high += 1,
                Some(Severity::Critical) => counts.critical += 1,
                None => {}
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }

    /// Count of findings at or above `floor`.
    pub fn at_or_above(&self, floor: Severity) -> usize {
        match floor {
            Severity::Low => self.total(),
            Severity::Medium => self.medium + self.high + self.critical,
            Severity::High => self.high + self.critical,
            Severity::Critical => self.critical,
        }
    }
}

impl fmt::Display for SeverityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "critical: {}, high: {}, medium: {}, low: {}",
            self.critical, self.high, self.medium, self.low
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_never_carries_raw_value() {
        let f = Finding::pii("email", Span::new(0, 16), "john@example.com");
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("john@example.com"));
        assert!(json.contains("content_hash"));
    }

    #[test]
    fn content_digest_is_pattern_scoped() {
        let a = content_digest("email", "value");
        let b = content_digest("phone", "value");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn span_overlap() {
        assert!(Span::new(0, 5).overlaps(&Span::new(4, 9)));
        assert!(!Span::new(0, 5).overlaps(&Span::new(5, 9)));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn classification_ordering() {
        assert!(Classification::Sensitive > Classification::Internal);
        assert!(Classification::Internal > Classification::Public);
    }

    #[test]
    fn severity_counts_floor() {
        let findings = vec![
            Finding::secret("a", Span::new(0, 4), Severity::Critical, "x"),
            Finding::secret("b", Span::new(5, 9), Severity::Medium, "y"),
        ];
        let counts = SeverityCounts::tally(&findings);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.at_or_above(Severity::High), 1);
        assert_eq!(counts.at_or_above(Severity::Low), 2);
    }
}
