//! Events that can occur in a conversation

use uuid::Uuid;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
        /// Id assigned to the completion request this message will issue
        request_id: Uuid,
    },

    // Completion events
    CompletionReply {
        request_id: Uuid,
        text: String,
    },
    CompletionFailed {
        request_id: Uuid,
    },
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage {
            text: text.into(),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::CompletionReply { .. } => "completion_reply",
            Event::CompletionFailed { .. } => "completion_failed",
        }
    }
}
