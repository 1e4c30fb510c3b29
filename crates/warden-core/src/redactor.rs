//! PII detection and placeholder substitution.
//!
//! The Redactor applies an ordered set of named patterns over the input in a
//! single pass, replacing each match with a fixed bracketed placeholder
//! (`[EMAIL]`, `[SSN]`, …). Placeholders are never re-matched by any pattern,
//! so scrubbing already-sanitized text is idempotent. Overlapping matches
//! resolve leftmost-longest; spans in the returned findings index into the
//! *original* text. Raw matched values survive only long enough to be hashed.
//!
//! Malformed custom patterns are rejected when the config is built —
//! `scrub` itself cannot fail.

use crate::error::PipelineError;
use crate::finding::{Finding, ScrubResult, Span};
use once_cell::sync::Lazy;
use regex::Regex;

/// One built-in PII pattern: stable id, placeholder token, compiled regex.
/// Listed in priority order — earlier entries win ties at the same offset.
struct BuiltinPattern {
    id: &'static str,
    placeholder: &'static str,
    regex: Regex,
}

/// Built-in pattern ids whose presence floors classification at Sensitive.
pub const SENSITIVE_PII_KINDS: &[&str] = &["national_id", "medical_id", "payment_card", "date_of_birth"];

static BUILTIN_PATTERNS: Lazy<Vec<BuiltinPattern>> = Lazy::new(|| {
    // Regexes are fixed at compile time; `expect` here is a build-time assertion.
    let compile = |p: &str| Regex::new(p).expect("built-in PII pattern must compile");
    vec![
        BuiltinPattern {
            id: "national_id",
            placeholder: "[SSN]",
            regex: compile(r"\b\d{3}-\d{2}-\d{4}\b"),
        },
        BuiltinPattern {
            id: "payment_card",
            placeholder: "[PAYMENT_CARD]",
            regex: compile(r"\b(?:\d{4}[ -]?){3}\d{4}\b"),
        },
        BuiltinPattern {
            id: "medical_id",
            placeholder: "[MEDICAL_ID]",
            regex: compile(r"(?i)\b(?:MRN|PATIENT[_ -]?ID|PT)[-:# ]\s*\d{5,10}\b"),
        },
        BuiltinPattern {
            id: "date_of_birth",
            placeholder: "[DOB]",
            regex: compile(
                r"(?i)\b(?:DOB|date of birth|birth ?date)[:\s]+\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b",
            ),
        },
        BuiltinPattern {
            id: "email",
            placeholder: "[EMAIL]",
            regex: compile(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        },
        BuiltinPattern {
            id: "ip_address",
            placeholder: "[IP_ADDRESS]",
            regex: compile(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d{1,2})\.){3}(?:25[0-5]|2[0-4]\d|1?\d{1,2})\b"),
        },
        BuiltinPattern {
            id: "phone",
            placeholder: "[PHONE]",
            regex: compile(r"\b(?:\+?\d{1,2}[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b"),
        },
    ]
});

/// Caller-supplied pattern, validated and compiled at configuration time.
#[derive(Debug, Clone)]
pub struct CustomPattern {
    pub id: String,
    pub placeholder: String,
    regex: Regex,
}

/// Redactor configuration: which built-ins are active plus custom patterns.
/// Constructed once and moved into the `Redactor` — no process-wide registry.
#[derive(Debug, Clone, Default)]
pub struct RedactorConfig {
    disabled: Vec<String>,
    custom: Vec<CustomPattern>,
}

impl RedactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable a built-in pattern by id. Unknown ids are rejected.
    pub fn disable(mut self, pattern_id: &str) -> Result<Self, PipelineError> {
        if !BUILTIN_PATTERNS.iter().any(|p| p.id == pattern_id) {
            return Err(PipelineError::Validation(format!(
                "unknown built-in pattern id '{pattern_id}'"
            )));
        }
        self.disabled.push(pattern_id.to_string());
        Ok(self)
    }

    /// Register a custom pattern. Rejected here (not during scrub) if the
    /// regex is malformed, the placeholder is not a bracketed tag, or the
    /// regex would re-match any known placeholder token.
    pub fn add_custom_pattern(
        mut self,
        id: &str,
        placeholder: &str,
        pattern: &str,
    ) -> Result<Self, PipelineError> {
        if id.is_empty() {
            return Err(PipelineError::Validation(
                "custom pattern id must be non-empty".to_string(),
            ));
        }
        if !placeholder.starts_with('[')
            || !placeholder.ends_with(']')
            || !placeholder[1..placeholder.len() - 1]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_')
        {
            return Err(PipelineError::Validation(format!(
                "placeholder '{placeholder}' must be a bracketed tag like [CUSTOM_KIND]"
            )));
        }
        let regex = Regex::new(pattern).map_err(|e| {
            PipelineError::Validation(format!("custom pattern '{id}' failed to compile: {e}"))
        })?;
        // Idempotence guard: the new pattern must not match any placeholder
        // token, its own included — otherwise re-scrubbing would re-match.
        let mut tokens: Vec<&str> = BUILTIN_PATTERNS.iter().map(|p| p.placeholder).collect();
        tokens.extend(self.custom.iter().map(|p| p.placeholder.as_str()));
        tokens.push(placeholder);
        for token in tokens {
            if regex.is_match(token) {
                return Err(PipelineError::Validation(format!(
                    "custom pattern '{id}' would re-match placeholder token {token}"
                )));
            }
        }
        self.custom.push(CustomPattern {
            id: id.to_string(),
            placeholder: placeholder.to_string(),
            regex,
        });
        Ok(self)
    }
}

/// Pattern-based PII detector and placeholder substituter.
pub struct Redactor {
    config: RedactorConfig,
}

/// Candidate match before overlap resolution.
struct Candidate<'a> {
    span: Span,
    priority: usize,
    pattern_id: &'a str,
    placeholder: &'a str,
}

impl Redactor {
    pub fn new(config: RedactorConfig) -> Self {
        Self { config }
    }

    /// Apply every enabled pattern over `text` once, replacing matches with
    /// placeholder tokens. Infallible: bad patterns were rejected at config
    /// time. Idempotent: placeholders never re-match.
    pub fn scrub(&self, text: &str) -> ScrubResult {
        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        let mut priority = 0usize;
        for pattern in BUILTIN_PATTERNS.iter() {
            if self.config.disabled.iter().any(|d| d == pattern.id) {
                continue;
            }
            for m in pattern.regex.find_iter(text) {
                candidates.push(Candidate {
                    span: Span::new(m.start(), m.end()),
                    priority,
                    pattern_id: pattern.id,
                    placeholder: pattern.placeholder,
                });
            }
            priority += 1;
        }
        for pattern in &self.config.custom {
            for m in pattern.regex.find_iter(text) {
                candidates.push(Candidate {
                    span: Span::new(m.start(), m.end()),
                    priority,
                    pattern_id: &pattern.id,
                    placeholder: &pattern.placeholder,
                });
            }
            priority += 1;
        }

        // Leftmost-longest: earliest start wins, then the longer match, then
        // pattern priority.
        candidates.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then(b.span.end.cmp(&a.span.end))
                .then(a.priority.cmp(&b.priority))
        });
        let mut kept: Vec<&Candidate<'_>> = Vec::new();
        for cand in &candidates {
            if kept.iter().all(|k| !k.span.overlaps(&cand.span)) {
                kept.push(cand);
            }
        }
        kept.sort_by_key(|c| c.span.start);

        let mut sanitized = String::with_capacity(text.len());
        let mut findings = Vec::with_capacity(kept.len());
        let mut cursor = 0usize;
        for cand in kept {
            sanitized.push_str(&text[cursor..cand.span.start]);
            sanitized.push_str(cand.placeholder);
            let matched = &text[cand.span.start..cand.span.end];
            findings.push(Finding::pii(cand.pattern_id, cand.span, matched));
            cursor = cand.span.end;
        }
        sanitized.push_str(&text[cursor..]);

        if !findings.is_empty() {
            tracing::debug!(
                target: "warden::redactor",
                count = findings.len(),
                "scrub replaced PII matches"
            );
        }
        ScrubResult {
            sanitized_text: sanitized,
            pii_findings: findings,
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(RedactorConfig::default())
    }
}
