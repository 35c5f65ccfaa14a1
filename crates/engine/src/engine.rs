//! Bounded attempt loop around the generation state machine.
//!
//! The engine owns the only I/O in a generation run: one LLM call per
//! attempt, each under its own timeout and raced against the cancel signal.
//! Every other decision (retry, accept, fall back) is delegated to the pure
//! transition function in `stencil-core`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use stencil_core::deviation::{DeviationResult, DeviationScorer};
use stencil_core::generation::{
    transition, GenerationContext, GenerationEvent, GenerationFlowError, GenerationState,
};
use stencil_core::response::{AttemptOutcome, GenerationAttempt};
use stencil_core::TransportError;

use crate::cancel::CancelSignal;
use crate::llm::{CompletionRequest, LlmClient};

/// An AI candidate that satisfied the tolerance limit.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedCandidate {
    pub text: String,
    pub deviation: DeviationResult,
}

/// Everything one engine run produced. `attempts` is the complete ordered
/// history; an abandoned in-flight call leaves no entry.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRun {
    pub final_state: GenerationState,
    pub attempts: Vec<GenerationAttempt>,
    pub accepted: Option<AcceptedCandidate>,
}

pub struct ResponseEngine {
    llm: Arc<dyn LlmClient>,
    max_attempts: u32,
    attempt_timeout: Duration,
}

enum CandidateCall {
    Completed(Result<String, TransportError>),
    Cancelled,
}

impl ResponseEngine {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self { llm, max_attempts, attempt_timeout }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs the attempt loop for one already-filled request. Transport
    /// failures are recorded as spent attempts, never propagated; the caller
    /// can always fall back to `standard_text`.
    pub async fn run(
        &self,
        scorer: &DeviationScorer,
        request: &CompletionRequest,
        standard_text: &str,
        cancel: &mut CancelSignal,
    ) -> Result<EngineRun, GenerationFlowError> {
        let context = GenerationContext::new(self.max_attempts)?;
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut accepted: Option<AcceptedCandidate> = None;

        let seed = if cancel.is_cancelled() {
            GenerationEvent::CancelRequested
        } else {
            GenerationEvent::StandardFilled
        };
        let mut state = transition(&context, GenerationState::Filling, seed)?.to;

        while let GenerationState::Attempting { attempt } = state {
            let event = if cancel.is_cancelled() {
                GenerationEvent::CancelRequested
            } else {
                match self.request_candidate(request, cancel).await {
                    CandidateCall::Completed(Ok(candidate_text)) => {
                        let deviation = scorer.score(standard_text, &candidate_text);
                        info!(
                            event_name = "generation.attempt_scored",
                            attempt,
                            deviation = deviation.deviation_percentage,
                            within_tolerance = deviation.within_tolerance,
                            "candidate scored against the standard text"
                        );
                        let within = deviation.within_tolerance;
                        if within {
                            accepted = Some(AcceptedCandidate {
                                text: candidate_text.clone(),
                                deviation: deviation.clone(),
                            });
                        }
                        attempts.push(GenerationAttempt {
                            index: attempt,
                            outcome: AttemptOutcome::Scored { candidate_text, deviation },
                        });
                        if within {
                            GenerationEvent::CandidateWithinTolerance
                        } else {
                            GenerationEvent::CandidateExceededTolerance
                        }
                    }
                    CandidateCall::Completed(Err(error)) => {
                        warn!(
                            event_name = "generation.attempt_failed",
                            attempt,
                            error = %error,
                            "candidate request failed"
                        );
                        attempts.push(GenerationAttempt {
                            index: attempt,
                            outcome: AttemptOutcome::Failed { error },
                        });
                        GenerationEvent::AttemptFailed
                    }
                    CandidateCall::Cancelled => GenerationEvent::CancelRequested,
                }
            };
            state = transition(&context, state, event)?.to;
        }

        match state {
            GenerationState::AcceptedAi { attempt } => {
                info!(
                    event_name = "generation.accepted_ai",
                    attempt,
                    "AI candidate accepted within tolerance"
                );
            }
            GenerationState::FallbackStandard { attempts: completed } => {
                info!(
                    event_name = "generation.fell_back",
                    attempts = completed,
                    "serving the filled standard text"
                );
            }
            _ => {}
        }

        Ok(EngineRun { final_state: state, attempts, accepted })
    }

    async fn request_candidate(
        &self,
        request: &CompletionRequest,
        cancel: &mut CancelSignal,
    ) -> CandidateCall {
        let call = tokio::time::timeout(self.attempt_timeout, self.llm.complete(request));
        tokio::select! {
            completed = call => match completed {
                Ok(result) => CandidateCall::Completed(result),
                Err(_) => CandidateCall::Completed(Err(TransportError::Timeout {
                    secs: self.attempt_timeout.as_secs(),
                })),
            },
            () = cancel.cancelled() => CandidateCall::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use stencil_core::deviation::DeviationScorer;
    use stencil_core::generation::GenerationState;
    use stencil_core::response::AttemptOutcome;
    use stencil_core::TransportError;

    use super::ResponseEngine;
    use crate::cancel::{cancel_pair, CancelSignal};
    use crate::llm::{CompletionRequest, LlmClient};

    const STANDARD: &str = "Dear Alex, your order 5521 is delayed.";

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self { responses: Mutex::new(responses.into()), calls: AtomicU32::new(0) })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("scripted responses")
                .pop_front()
                .unwrap_or(Err(TransportError::Network { message: "script exhausted".to_string() }))
        }
    }

    struct StalledLlm;

    #[async_trait]
    impl LlmClient for StalledLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, TransportError> {
            std::future::pending().await
        }
    }

    fn completion_request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "system".to_string(),
            user_prompt: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn first_candidate_within_tolerance_is_accepted() {
        let llm = ScriptedLlm::new(vec![Ok(STANDARD.to_string())]);
        let engine = ResponseEngine::new(llm.clone(), 3, Duration::from_secs(5));
        let scorer = DeviationScorer::new(25.0);

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut CancelSignal::never())
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::AcceptedAi { attempt: 1 });
        let accepted = run.accepted.expect("candidate accepted");
        assert_eq!(accepted.text, STANDARD);
        assert_eq!(accepted.deviation.deviation_percentage, 0.0);
        assert_eq!(run.attempts.len(), 1);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_falls_back_with_full_history() {
        let rejected = "completely different words entirely".to_string();
        let llm = ScriptedLlm::new(vec![
            Ok(rejected.clone()),
            Ok(rejected.clone()),
            Ok(rejected.clone()),
        ]);
        let engine = ResponseEngine::new(llm.clone(), 3, Duration::from_secs(5));
        let scorer = DeviationScorer::new(10.0);

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut CancelSignal::never())
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::FallbackStandard { attempts: 3 });
        assert!(run.accepted.is_none());
        assert_eq!(run.attempts.len(), 3);
        assert!(run.attempts.iter().all(|attempt| matches!(
            attempt.outcome,
            AttemptOutcome::Scored { ref deviation, .. } if !deviation.within_tolerance
        )));
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn transport_failure_spends_an_attempt_then_recovers() {
        let llm = ScriptedLlm::new(vec![
            Err(TransportError::Network { message: "connection refused".to_string() }),
            Ok(STANDARD.to_string()),
        ]);
        let engine = ResponseEngine::new(llm.clone(), 3, Duration::from_secs(5));
        let scorer = DeviationScorer::new(25.0);

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut CancelSignal::never())
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::AcceptedAi { attempt: 2 });
        assert_eq!(run.attempts.len(), 2);
        assert!(matches!(run.attempts[0].outcome, AttemptOutcome::Failed { .. }));
        assert!(matches!(run.attempts[1].outcome, AttemptOutcome::Scored { .. }));
    }

    #[tokio::test]
    async fn attempt_timeout_counts_as_a_failed_attempt() {
        let engine = ResponseEngine::new(Arc::new(StalledLlm), 2, Duration::from_millis(10));
        let scorer = DeviationScorer::new(25.0);

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut CancelSignal::never())
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::FallbackStandard { attempts: 2 });
        assert_eq!(run.attempts.len(), 2);
        assert!(run.attempts.iter().all(|attempt| matches!(
            attempt.outcome,
            AttemptOutcome::Failed { error: TransportError::Timeout { .. } }
        )));
    }

    #[tokio::test]
    async fn pre_cancelled_run_requests_nothing() {
        let llm = ScriptedLlm::new(vec![Ok(STANDARD.to_string())]);
        let engine = ResponseEngine::new(llm.clone(), 3, Duration::from_secs(5));
        let scorer = DeviationScorer::new(25.0);

        let (handle, mut signal) = cancel_pair();
        handle.cancel();

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut signal)
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::FallbackStandard { attempts: 0 });
        assert!(run.attempts.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn mid_attempt_cancellation_abandons_the_call() {
        let engine = ResponseEngine::new(Arc::new(StalledLlm), 3, Duration::from_secs(60));
        let scorer = DeviationScorer::new(25.0);

        let (handle, mut signal) = cancel_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            handle.cancel();
        });

        let run = engine
            .run(&scorer, &completion_request(), STANDARD, &mut signal)
            .await
            .expect("run completes");

        assert_eq!(run.final_state, GenerationState::FallbackStandard { attempts: 0 });
        assert!(run.attempts.is_empty(), "abandoned attempt is not recorded");
    }
}
