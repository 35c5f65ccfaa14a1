//! Generation flow state machine.
//!
//! Pure transition logic with no I/O: the engine fills the standard text,
//! then loops bounded candidate attempts, and this module decides what each
//! observation means. Replaying the same event sequence from the same
//! context always yields the same states and actions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a response request currently stands.
///
/// `AcceptedAi` and `FallbackStandard` are terminal; both carry the number of
/// attempts that were actually completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    Filling,
    Attempting { attempt: u32 },
    AcceptedAi { attempt: u32 },
    FallbackStandard { attempts: u32 },
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AcceptedAi { .. } | Self::FallbackStandard { .. })
    }
}

/// Observations fed into the machine by the driving engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationEvent {
    StandardFilled,
    CandidateWithinTolerance,
    CandidateExceededTolerance,
    AttemptFailed,
    CancelRequested,
}

/// What the engine must do next after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationAction {
    RequestCandidate,
    EmitAiResponse,
    EmitStandardResponse,
}

/// Fixed parameters of one generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationContext {
    max_attempts: u32,
}

impl GenerationContext {
    pub fn new(max_attempts: u32) -> Result<Self, GenerationFlowError> {
        if max_attempts == 0 {
            return Err(GenerationFlowError::InvalidMaxAttempts);
        }
        Ok(Self { max_attempts })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationFlowError {
    #[error("generation requires at least one attempt")]
    InvalidMaxAttempts,
    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidTransition {
        state: GenerationState,
        event: GenerationEvent,
    },
}

/// One applied transition, with the actions the engine owes in response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: GenerationState,
    pub to: GenerationState,
    pub event: GenerationEvent,
    pub actions: Vec<GenerationAction>,
}

pub fn transition(
    context: &GenerationContext,
    current: GenerationState,
    event: GenerationEvent,
) -> Result<TransitionOutcome, GenerationFlowError> {
    use GenerationAction as Action;
    use GenerationEvent as Event;
    use GenerationState as State;

    let (to, actions) = match (current, event) {
        (State::Filling, Event::StandardFilled) => (
            State::Attempting { attempt: 1 },
            vec![Action::RequestCandidate],
        ),
        (State::Filling, Event::CancelRequested) => (
            State::FallbackStandard { attempts: 0 },
            vec![Action::EmitStandardResponse],
        ),
        (State::Attempting { attempt }, Event::CandidateWithinTolerance) => (
            State::AcceptedAi { attempt },
            vec![Action::EmitAiResponse],
        ),
        (
            State::Attempting { attempt },
            Event::CandidateExceededTolerance | Event::AttemptFailed,
        ) => {
            if attempt < context.max_attempts() {
                (
                    State::Attempting { attempt: attempt + 1 },
                    vec![Action::RequestCandidate],
                )
            } else {
                (
                    State::FallbackStandard { attempts: attempt },
                    vec![Action::EmitStandardResponse],
                )
            }
        }
        (State::Attempting { attempt }, Event::CancelRequested) => (
            // The in-flight attempt is abandoned and does not count.
            State::FallbackStandard {
                attempts: attempt.saturating_sub(1),
            },
            vec![Action::EmitStandardResponse],
        ),
        (state, event) => return Err(GenerationFlowError::InvalidTransition { state, event }),
    };

    Ok(TransitionOutcome {
        from: current,
        to,
        event,
        actions,
    })
}
