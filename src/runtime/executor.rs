//! Conversation runtime executor

use super::traits::CompletionClient;
use super::{RuntimeCommand, Snapshot, SseEvent};

use crate::conversation::{Applied, Conversation};
use crate::llm::CompletionRequest;
use crate::state_machine::{Effect, TransitionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Single writer of one session's conversation
pub struct ConversationRuntime<C>
where
    C: CompletionClient + 'static,
{
    conversation_id: Uuid,
    conversation: Conversation,
    client: Arc<C>,
    command_rx: mpsc::Receiver<RuntimeCommand>,
    command_tx: mpsc::Sender<RuntimeCommand>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    idle_timeout: Duration,
}

impl<C> ConversationRuntime<C>
where
    C: CompletionClient + 'static,
{
    pub fn new(
        conversation_id: Uuid,
        conversation: Conversation,
        client: Arc<C>,
        command_rx: mpsc::Receiver<RuntimeCommand>,
        command_tx: mpsc::Sender<RuntimeCommand>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            conversation_id,
            conversation,
            client,
            command_rx,
            command_tx,
            broadcast_tx,
            idle_timeout,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(conv_id = %self.conversation_id, "Starting conversation runtime");

        // Commands are handled one at a time; the request itself runs in its
        // own task so snapshots and rejections are served while pending.
        loop {
            let command =
                match tokio::time::timeout(self.idle_timeout, self.command_rx.recv()).await {
                    Ok(Some(command)) => command,
                    Ok(None) => break,
                    Err(_) if self.is_abandoned() => {
                        tracing::info!(conv_id = %self.conversation_id, "Session idle with no clients, ending");
                        break;
                    }
                    Err(_) => continue,
                };

            match command {
                RuntimeCommand::Submit { text, reply } => {
                    let result = self
                        .conversation
                        .submit_user_text(&text)
                        .map(|applied| self.dispatch(applied));
                    if let Err(e) = &result {
                        tracing::debug!(conv_id = %self.conversation_id, error = %e, "Submission rejected");
                    }
                    let _ = reply.send(result);
                }
                RuntimeCommand::Settle {
                    request_id,
                    outcome,
                } => self.settle(request_id, outcome),
                RuntimeCommand::Snapshot {
                    after_sequence,
                    reply,
                } => {
                    let _ = reply.send(self.snapshot(after_sequence));
                }
                RuntimeCommand::Shutdown => break,
            }
        }

        tracing::info!(conv_id = %self.conversation_id, "Conversation runtime stopped");
    }

    /// Nobody is watching and nothing is in flight
    fn is_abandoned(&self) -> bool {
        !self.conversation.is_pending() && self.broadcast_tx.receiver_count() == 0
    }

    fn settle(&mut self, request_id: Uuid, outcome: Result<String, ()>) {
        let failed = outcome.is_err();
        let result: Result<Applied, TransitionError> = match outcome {
            Ok(text) => self.conversation.record_bot_reply(request_id, &text),
            Err(()) => self.conversation.record_failure(request_id),
        };

        match result {
            Ok(applied) => {
                self.dispatch(applied);
                // Clients only learn that it failed; details stay in the logs.
                if failed {
                    let _ = self.broadcast_tx.send(SseEvent::Error {
                        message: "The assistant could not be reached".to_string(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(conv_id = %self.conversation_id, %request_id, error = %e, "Ignoring settle");
            }
        }
    }

    fn snapshot(&self, after_sequence: Option<u64>) -> Snapshot {
        let messages = match after_sequence {
            Some(after) => self.conversation.messages_after(after),
            None => self.conversation.messages(),
        };
        Snapshot {
            messages: messages.to_vec(),
            pending: self.conversation.is_pending(),
            last_sequence_id: self.conversation.last_sequence_id(),
        }
    }

    fn dispatch(&self, applied: Applied) {
        // Every appended message goes out so clients can reveal it.
        for message in applied.appended {
            let _ = self.broadcast_tx.send(SseEvent::Message { message });
        }

        for effect in applied.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&self, effect: Effect) {
        match effect {
            // Materialized by the conversation before we get here
            Effect::AppendMessage { .. } => {}

            Effect::NotifyStateChange { state } => {
                let _ = self.broadcast_tx.send(SseEvent::StateChange { state });
            }

            Effect::RequestCompletion { request_id, text } => {
                self.spawn_request(request_id, text);
            }
        }
    }

    /// Issue the completion request in the background. Whatever happens,
    /// exactly one settle command is sent back.
    fn spawn_request(&self, request_id: Uuid, text: String) {
        let client = self.client.clone();
        let command_tx = self.command_tx.clone();
        let conv_id = self.conversation_id;

        tokio::spawn(async move {
            tracing::info!(conv_id = %conv_id, %request_id, "Making completion request (background)");

            let request = CompletionRequest::new(text);
            // Run the call in its own task so a panic settles as a failure.
            let outcome = match tokio::spawn(async move { client.complete(&request).await }).await
            {
                Ok(Ok(response)) => Ok(response.text),
                Ok(Err(e)) => {
                    tracing::debug!(conv_id = %conv_id, %request_id, error = %e, "Completion failed");
                    Err(())
                }
                Err(e) => {
                    tracing::error!(conv_id = %conv_id, error = %e, "Completion task panicked");
                    Err(())
                }
            };

            let settle = RuntimeCommand::Settle {
                request_id,
                outcome,
            };
            if command_tx.send(settle).await.is_err() {
                tracing::debug!(conv_id = %conv_id, "Runtime stopped before request settled");
            }
        });
    }
}
