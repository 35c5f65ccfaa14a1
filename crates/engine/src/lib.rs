//! Response Engine - bounded AI generation over catalog templates
//!
//! This crate turns a filled standard response into a served response:
//! - Builds the candidate prompt from the filled template texts
//! - Runs a bounded attempt loop against a pluggable LLM client
//! - Scores every candidate and accepts only those within tolerance
//! - Falls back to the filled standard text when the budget is spent
//!
//! # Architecture
//!
//! One request flows through three layers:
//! 1. **Service** (`service`) - Catalog lookup, profile merge, template fill
//! 2. **Engine** (`engine`) - Attempt loop driving the core state machine
//! 3. **Client** (`llm`, `openai`) - One completion call per attempt
//!
//! # Key Types
//!
//! - `ResponseService` - Main entry point (see `service` module)
//! - `LlmClient` - Pluggable completion trait; `OpenAiClient` is the default
//! - `CancelSignal` - Cooperative cancellation observed between attempts
//!
//! # Safety Principle
//!
//! The LLM is strictly a rephraser. It NEVER decides tolerance limits or
//! whether a candidate is acceptable. Those are deterministic decisions made
//! by the scoring core, and the filled standard text always exists as the
//! fallback.

pub mod cancel;
pub mod engine;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod service;
