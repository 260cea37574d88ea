//! Conversation store
//!
//! Owns the ordered message history and the request state of one chat
//! session. Every mutation goes through the pure state machine; this type
//! only materializes the `AppendMessage` effects it produces.

use crate::state_machine::{transition, ConvState, Effect, Event, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// A message in the conversation. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Random, so two messages created in the same instant never collide
    pub id: Uuid,
    /// 1-based position in the conversation
    pub sequence_id: u64,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of applying one event
#[derive(Debug, Default)]
pub struct Applied {
    /// Messages appended by this event, in order
    pub appended: Vec<Message>,
    /// Effects left for the caller to execute
    pub effects: Vec<Effect>,
}

#[cfg(test)]
impl Applied {
    /// The completion request to issue, if this event started one
    pub fn completion_request(&self) -> Option<(Uuid, &str)> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::RequestCompletion { request_id, text } => Some((*request_id, text.as_str())),
            _ => None,
        })
    }
}

/// One session's conversation, in memory only
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    state: ConvState,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event. On rejection nothing changes.
    fn apply(&mut self, event: Event) -> Result<Applied, TransitionError> {
        let result = transition(&self.state, event)?;
        self.state = result.new_state;

        let mut applied = Applied::default();
        for effect in result.effects {
            match effect {
                Effect::AppendMessage { sender, text } => {
                    let message = self.append(sender, text);
                    applied.appended.push(message);
                }
                other => applied.effects.push(other),
            }
        }
        Ok(applied)
    }

    /// Append the user's text and start a request.
    ///
    /// Rejected with `EmptyMessage` for blank text and `Busy` while a
    /// request is outstanding.
    pub fn submit_user_text(&mut self, text: &str) -> Result<Applied, TransitionError> {
        self.apply(Event::user_message(text))
    }

    /// Settle request `request_id` with a reply.
    ///
    /// Rejected with `InvalidTransition` unless that request is the one in
    /// flight, so a late or duplicate settle never appends a second reply.
    pub fn record_bot_reply(
        &mut self,
        request_id: Uuid,
        text: &str,
    ) -> Result<Applied, TransitionError> {
        self.apply(Event::CompletionReply {
            request_id,
            text: text.to_string(),
        })
    }

    /// Settle request `request_id` with the apology message.
    pub fn record_failure(&mut self, request_id: Uuid) -> Result<Applied, TransitionError> {
        self.apply(Event::CompletionFailed { request_id })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages with a sequence id greater than `sequence_id`
    pub fn messages_after(&self, sequence_id: u64) -> &[Message] {
        let start = usize::try_from(sequence_id).unwrap_or(usize::MAX);
        self.messages.get(start..).unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn state(&self) -> ConvState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    pub fn last_sequence_id(&self) -> u64 {
        self.messages.last().map_or(0, |m| m.sequence_id)
    }

    fn append(&mut self, sender: Sender, text: String) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            sequence_id: self.last_sequence_id() + 1,
            sender,
            text,
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }
}
