//! Result types for one produced response: which text was chosen, where it
//! came from, and the full attempt history behind that choice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deviation::DeviationResult;
use crate::errors::TransportError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Standard,
    AiGenerated,
}

impl ResponseSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::AiGenerated => "ai_generated",
        }
    }
}

/// What a single generation attempt produced: a scored candidate, or the
/// transport failure that consumed the attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Scored {
        candidate_text: String,
        deviation: DeviationResult,
    },
    Failed {
        error: TransportError,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// 1-based position in the attempt sequence.
    pub index: u32,
    pub outcome: AttemptOutcome,
}

/// The outcome of `produce_response`. `deviation` is populated exactly when
/// an AI candidate was accepted; a standard fallback carries the attempt
/// history that led to it instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub department: String,
    pub template_id: String,
    pub text: String,
    pub source: ResponseSource,
    pub deviation: Option<DeviationResult>,
    pub attempts: Vec<GenerationAttempt>,
    pub attempt_count: u32,
    pub unknown_fields: Vec<String>,
    pub tolerance_limit: f64,
    pub generated_at: DateTime<Utc>,
}
