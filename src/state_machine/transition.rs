//! Pure state transition function
//!
//! Given the same state and event this always produces the same result,
//! with no I/O.

use super::{ConvState, Effect, Event};
use thiserror::Error;

/// Bot reply recorded when a completion request fails
pub const APOLOGY_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A reply is still pending, wait for it before sending another message")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Blank input is never a message, whatever the state.
        (_, Event::UserMessage { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        // Idle + UserMessage -> Pending
        (ConvState::Idle, Event::UserMessage { text, request_id }) => {
            let pending = ConvState::Pending { request_id };
            Ok(TransitionResult::new(pending)
                .with_effect(Effect::append_user_message(text.clone()))
                .with_effect(Effect::notify_state_change(pending))
                .with_effect(Effect::RequestCompletion { request_id, text }))
        }

        // Pending + UserMessage -> reject, nothing is queued
        (ConvState::Pending { .. }, Event::UserMessage { .. }) => Err(TransitionError::Busy),

        // Pending + CompletionReply -> Idle with the reply
        (ConvState::Pending { request_id }, Event::CompletionReply { request_id: settled, text })
            if *request_id == settled =>
        {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_bot_message(text))
                .with_effect(Effect::notify_state_change(ConvState::Idle)))
        }

        // Pending + CompletionFailed -> Idle with the apology
        (ConvState::Pending { request_id }, Event::CompletionFailed { request_id: settled, .. })
            if *request_id == settled =>
        {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_bot_message(APOLOGY_REPLY))
                .with_effect(Effect::notify_state_change(ConvState::Idle)))
        }

        // Settle events for a request that is not in flight
        (state, event @ (Event::CompletionReply { .. } | Event::CompletionFailed { .. })) => {
            Err(TransitionError::InvalidTransition(format!(
                "{} in state {}",
                event.name(),
                state.name()
            )))
        }
    }
}
