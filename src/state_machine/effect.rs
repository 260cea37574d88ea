//! Effects produced by state transitions

use super::ConvState;
use crate::conversation::Sender;
use uuid::Uuid;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a message to the conversation
    AppendMessage { sender: Sender, text: String },

    /// Issue the completion request for a user message
    RequestCompletion { request_id: Uuid, text: String },

    /// Notify connected clients of the new state
    NotifyStateChange { state: ConvState },
}

impl Effect {
    pub fn append_user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn append_bot_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::Bot,
            text: text.into(),
        }
    }

    pub fn notify_state_change(state: ConvState) -> Self {
        Effect::NotifyStateChange { state }
    }
}
