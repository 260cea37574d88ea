//! Conversation state types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation state
///
/// `Pending` carries the id of the one request in flight so that a settle
/// event can be matched against it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input, no request outstanding
    #[default]
    Idle,

    /// Completion request in flight
    Pending { request_id: Uuid },
}

impl ConvState {
    pub fn is_pending(&self) -> bool {
        self.request_id().is_some()
    }

    /// Id of the request in flight, if any
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            ConvState::Idle => None,
            ConvState::Pending { request_id } => Some(*request_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::Pending { .. } => "pending",
        }
    }
}
