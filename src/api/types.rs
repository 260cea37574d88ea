//! API request and response types

use crate::conversation::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Session reference returned on creation
#[derive(Debug, Serialize)]
pub struct ConversationInfo {
    pub id: Uuid,
    pub model: String,
}

/// Response with a single conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: ConversationInfo,
}

/// Response with the messages of a conversation
#[derive(Debug, Serialize)]
pub struct ConversationWithMessagesResponse {
    pub messages: Vec<Message>,
    pub pending: bool,
    pub last_sequence_id: u64,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub accepted: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
