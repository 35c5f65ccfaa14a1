//! Deviation scoring between a standard approved response and a generated
//! candidate.
//!
//! The metric is token-bag Sørensen–Dice dissimilarity: both texts are
//! normalized (trimmed, whitespace runs collapsed, lowercased) and split into
//! maximal alphanumeric runs, then
//!
//! ```text
//! deviation = 100 × (1 − 2·|A ∩ B| / (|A| + |B|))
//! ```
//!
//! over the token multisets, rounded to one decimal. The score is 0 for texts
//! identical after normalization, 100 for texts sharing no tokens, symmetric
//! in its arguments, monotone in the shared-token count, and a pure function
//! of its inputs.

use serde::{Deserialize, Serialize};

use crate::tolerance::TolerancePreset;

/// Outcome of comparing a candidate against the standard response.
///
/// Carries the normalized lengths and token counts that produced the
/// percentage so callers can render the analysis without re-deriving it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviationResult {
    /// 0 = identical after normalization, 100 = no shared content.
    pub deviation_percentage: f64,
    /// Character length of the normalized standard text.
    pub standard_length: usize,
    /// Character length of the normalized candidate text.
    pub candidate_length: usize,
    pub standard_token_count: usize,
    pub candidate_token_count: usize,
    /// Multiset intersection size between the two token bags.
    pub shared_token_count: usize,
    /// Limit the percentage was judged against.
    pub tolerance_limit: f64,
    pub within_tolerance: bool,
}

impl DeviationResult {
    pub fn compliance(&self) -> ComplianceLevel {
        ComplianceLevel::classify(self.deviation_percentage, self.tolerance_limit)
    }
}

/// Grading bands layered over the raw percentage. A response over the
/// configured limit is always `Warning`, whatever band the raw number
/// falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Excellent,
    Good,
    Acceptable,
    Warning,
}

impl ComplianceLevel {
    pub fn classify(deviation_percentage: f64, tolerance_limit: f64) -> Self {
        if deviation_percentage > tolerance_limit {
            Self::Warning
        } else if deviation_percentage <= 10.0 {
            Self::Excellent
        } else if deviation_percentage <= 25.0 {
            Self::Good
        } else {
            Self::Acceptable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Warning => "warning",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Excellent => "response closely follows organization standards",
            Self::Good => "response stays within the acceptable deviation range",
            Self::Acceptable => "response meets the deviation tolerance requirements",
            Self::Warning => "response exceeds the configured tolerance limit",
        }
    }
}

/// Scores candidates against a fixed tolerance limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviationScorer {
    tolerance_limit: f64,
}

impl DeviationScorer {
    pub fn new(tolerance_limit: f64) -> Self {
        Self { tolerance_limit }
    }

    pub fn for_preset(preset: TolerancePreset) -> Self {
        Self::new(preset.limit())
    }

    pub fn tolerance_limit(&self) -> f64 {
        self.tolerance_limit
    }

    /// Compares `candidate_text` against `standard_text`. Deterministic and
    /// side-effect free; see the module docs for the metric.
    pub fn score(&self, standard_text: &str, candidate_text: &str) -> DeviationResult {
        let standard_normalized = normalize_text(standard_text);
        let candidate_normalized = normalize_text(candidate_text);

        let standard_tokens = tokenize(&standard_normalized);
        let candidate_tokens = tokenize(&candidate_normalized);
        let shared = shared_token_count(&standard_tokens, &candidate_tokens);

        let total = standard_tokens.len() + candidate_tokens.len();
        let deviation_percentage = if total == 0 {
            0.0
        } else {
            round_one_decimal(100.0 * (1.0 - (2.0 * shared as f64) / total as f64))
        };

        DeviationResult {
            deviation_percentage,
            standard_length: standard_normalized.chars().count(),
            candidate_length: candidate_normalized.chars().count(),
            standard_token_count: standard_tokens.len(),
            candidate_token_count: candidate_tokens.len(),
            shared_token_count: shared,
            tolerance_limit: self.tolerance_limit,
            within_tolerance: deviation_percentage <= self.tolerance_limit,
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn shared_token_count(left: &[String], right: &[String]) -> usize {
    let mut counts = std::collections::HashMap::new();
    for token in left {
        *counts.entry(token.as_str()).or_insert(0usize) += 1;
    }

    let mut shared = 0;
    for token in right {
        if let Some(remaining) = counts.get_mut(token.as_str()) {
            if *remaining > 0 {
                *remaining -= 1;
                shared += 1;
            }
        }
    }
    shared
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
