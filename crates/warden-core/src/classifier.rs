//! Sensitivity classification: scrub/scan results + caller hint → tier.
//!
//! Deterministic and side-effect-free. The computed floor can be raised by a
//! caller hint but never lowered; a downgrade attempt is a
//! `ClassificationConflict` error.

use crate::error::PipelineError;
use crate::finding::{Classification, ClassificationLabel, Finding, ScrubResult};
use crate::redactor::SENSITIVE_PII_KINDS;

/// Keyword heuristics for the Internal floor. Matched as lower-cased
/// substrings of the sanitized text, same mechanism as keyword policy checks
/// elsewhere in the framework.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub internal_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            internal_keywords: vec![
                "internal".to_string(),
                "confidential".to_string(),
                "do not distribute".to_string(),
                "proprietary".to_string(),
            ],
        }
    }
}

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Compute the tier for one store operation.
    ///
    /// Floor policy, in order: a Sensitive-kind PII finding (national id,
    /// medical id, payment card, DOB) floors at Sensitive; any other finding
    /// or an internal-keyword hit floors at Internal; otherwise Public.
    /// `caller_hint` may only raise the result above the floor.
    pub fn classify(
        &self,
        scrub: &ScrubResult,
        secret_findings: &[Finding],
        caller_hint: Option<Classification>,
    ) -> Result<ClassificationLabel, PipelineError> {
        let floor = self.floor(scrub, secret_findings);
        match caller_hint {
            Some(hint) if hint < floor.tier => Err(PipelineError::ClassificationConflict {
                requested: hint,
                floor: floor.tier,
            }),
            Some(hint) if hint > floor.tier => Ok(ClassificationLabel {
                tier: hint,
                rationale: format!("caller override (floor was {})", floor.tier),
            }),
            _ => Ok(floor),
        }
    }

    fn floor(&self, scrub: &ScrubResult, secret_findings: &[Finding]) -> ClassificationLabel {
        if scrub.has_any_kind(SENSITIVE_PII_KINDS) {
            let kind = scrub
                .pii_findings
                .iter()
                .find(|f| SENSITIVE_PII_KINDS.contains(&f.pattern_id()))
                .map(|f| f.pattern_id().to_string())
                .unwrap_or_default();
            return ClassificationLabel {
                tier: Classification::Sensitive,
                rationale: format!("{kind} pattern matched"),
            };
        }
        if !scrub.pii_findings.is_empty() || !secret_findings.is_empty() {
            return ClassificationLabel {
                tier: Classification::Internal,
                rationale: format!(
                    "{} PII and {} secret finding(s) present",
                    scrub.pii_findings.len(),
                    secret_findings.len()
                ),
            };
        }
        let lowered = scrub.sanitized_text.to_lowercase();
        for keyword in &self.config.internal_keywords {
            if lowered.contains(&keyword.to_lowercase()) {
                return ClassificationLabel {
                    tier: Classification::Internal,
                    rationale: format!("internal keyword '{keyword}' matched"),
                };
            }
        }
        ClassificationLabel {
            tier: Classification::Public,
            rationale: "no findings, no internal keywords".to_string(),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redactor::Redactor;

    fn scrub(text: &str) -> ScrubResult {
        Redactor::default().scrub(text)
    }

    #[test]
    fn national_id_floors_sensitive() {
        let c = Classifier::default();
        let label = c.classify(&scrub("SSN: 123-45-6789"), &[], None).unwrap();
        assert_eq!(label.tier, Classification::Sensitive);
        assert!(label.rationale.contains("national_id"));
    }

    #[test]
    fn plain_email_floors_internal() {
        let c = Classifier::default();
        let label = c.classify(&scrub("mail a@b.org"), &[], None).unwrap();
        assert_eq!(label.tier, Classification::Internal);
    }

    #[test]
    fn internal_keyword_floors_internal() {
        let c = Classifier::default();
        let label = c
            .classify(&scrub("CONFIDENTIAL roadmap draft"), &[], None)
            .unwrap();
        assert_eq!(label.tier, Classification::Internal);
    }

    #[test]
    fn clean_text_is_public() {
        let c = Classifier::default();
        let label = c
            .classify(&scrub("Team standup notes: discussed sprint velocity"), &[], None)
            .unwrap();
        assert_eq!(label.tier, Classification::Public);
    }

    #[test]
    fn hint_cannot_lower_floor() {
        let c = Classifier::default();
        let err = c
            .classify(
                &scrub("SSN: 123-45-6789"),
                &[],
                Some(Classification::Public),
            )
            .unwrap_err();
        match err {
            PipelineError::ClassificationConflict { requested, floor } => {
                assert_eq!(requested, Classification::Public);
                assert_eq!(floor, Classification::Sensitive);
            }
            other => panic!("expected ClassificationConflict, got {other:?}"),
        }
    }

    #[test]
    fn hint_raises_above_floor() {
        let c = Classifier::default();
        let label = c
            .classify(&scrub("plain notes"), &[], Some(Classification::Sensitive))
            .unwrap();
        assert_eq!(label.tier, Classification::Sensitive);
        assert!(label.rationale.contains("caller override"));
    }

    #[test]
    fn hint_equal_to_floor_is_fine() {
        let c = Classifier::default();
        let label = c
            .classify(&scrub("plain notes"), &[], Some(Classification::Public))
            .unwrap();
        assert_eq!(label.tier, Classification::Public);
    }
}
