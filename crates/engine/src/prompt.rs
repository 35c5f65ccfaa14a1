//! Prompt assembly for candidate generation.

use stencil_core::TolerancePreset;

use crate::llm::CompletionRequest;

/// Fixed system role for every candidate request.
pub const SYSTEM_PROMPT: &str = "You are a corporate customer service representative. You MUST \
use the provided standard response as your base template and stay within the specified deviation \
tolerance. Personalize the standard response to address the specific customer inquiry while \
maintaining the organization's approved language, tone, and structure. Do not deviate beyond the \
allowed percentage.";

/// Assembles the user prompt from the filled inquiry, the filled standard
/// response, and the preset's deviation guideline.
pub fn build_completion_request(
    inquiry_text: &str,
    standard_text: &str,
    tolerance: TolerancePreset,
) -> CompletionRequest {
    let user_prompt = format!(
        "Customer Inquiry: {inquiry_text}\n\n\
         Organization's Standard Response Template:\n{standard_text}\n\n\
         Deviation Guidelines: {guideline}\n\n\
         Using the standard response above as your base template, generate a personalized \
         response that addresses the specific customer inquiry while staying within the allowed \
         deviation tolerance. Maintain the organization's professional tone and include all \
         required corporate elements.",
        guideline = tolerance.instruction(),
    );

    CompletionRequest { system_prompt: SYSTEM_PROMPT.to_string(), user_prompt }
}
