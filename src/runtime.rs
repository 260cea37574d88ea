//! Runtime for executing conversations
//!
//! One task per session owns that session's conversation. Handlers reach it
//! through a [`ConversationHandle`].

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::conversation::{Conversation, Message};
use crate::state_machine::{ConvState, TransitionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use uuid::Uuid;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ConversationRuntime<Arc<dyn CompletionClient>>;

/// How long a session with no subscribers and no request in flight is kept
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Commands accepted by a conversation runtime
#[derive(Debug)]
pub enum RuntimeCommand {
    /// User submitted text; the reply says whether it was accepted
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), TransitionError>>,
    },
    /// A completion request settled: the reply text, or `Err` on failure
    Settle {
        request_id: Uuid,
        outcome: Result<String, ()>,
    },
    Snapshot {
        after_sequence: Option<u64>,
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown,
}

/// Point-in-time view of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub pending: bool,
    pub last_sequence_id: u64,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: Snapshot },
    Message { message: Message },
    StateChange { state: ConvState },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Conversation not found: {0}")]
    NotFound(Uuid),
    #[error("Conversation runtime has stopped")]
    Stopped,
    #[error(transparent)]
    Rejected(#[from] TransitionError),
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub command_tx: mpsc::Sender<RuntimeCommand>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
}

impl ConversationHandle {
    /// Submit user text. Returns once the runtime accepted or rejected it.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(RuntimeCommand::Submit {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)??;
        Ok(())
    }

    pub async fn snapshot(&self, after_sequence: Option<u64>) -> Result<Snapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(RuntimeCommand::Snapshot {
                after_sequence,
                reply,
            })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Manager for all conversation runtimes
///
/// Sessions live in memory only. They are discarded on removal, on exit, or
/// once their runtime ends after sitting idle with no subscribers.
pub struct RuntimeManager {
    client: Arc<dyn CompletionClient>,
    runtimes: RwLock<HashMap<Uuid, ConversationHandle>>,
    idle_timeout: Duration,
}

impl RuntimeManager {
    pub fn new(client: Arc<dyn CompletionClient>, idle_timeout: Duration) -> Self {
        Self {
            client,
            runtimes: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    /// Start a new session with an empty conversation
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime: ProductionRuntime = ConversationRuntime::new(
            id,
            Conversation::new(),
            Arc::new(self.client.clone()),
            command_rx,
            command_tx.clone(),
            broadcast_tx.clone(),
            self.idle_timeout,
        );
        tokio::spawn(runtime.run());

        let mut runtimes = self.runtimes.write().await;
        Self::prune(&mut runtimes);
        runtimes.insert(
            id,
            ConversationHandle {
                command_tx,
                broadcast_tx,
            },
        );

        tracing::info!(conv_id = %id, sessions = runtimes.len(), "Session created");
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<ConversationHandle, RuntimeError> {
        let handle = self.runtimes.read().await.get(&id).cloned();
        match handle {
            Some(handle) if !handle.command_tx.is_closed() => Ok(handle),
            Some(_) => {
                self.runtimes.write().await.remove(&id);
                Err(RuntimeError::NotFound(id))
            }
            None => Err(RuntimeError::NotFound(id)),
        }
    }

    /// Drop handles whose runtime has ended on its own
    fn prune(runtimes: &mut HashMap<Uuid, ConversationHandle>) {
        let before = runtimes.len();
        runtimes.retain(|_, handle| !handle.command_tx.is_closed());
        let evicted = before - runtimes.len();
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle sessions");
        }
    }

    /// End a session. Its conversation is dropped; a request still in
    /// flight settles into nothing.
    pub async fn remove(&self, id: Uuid) -> Result<(), RuntimeError> {
        let handle = self
            .runtimes
            .write()
            .await
            .remove(&id)
            .ok_or(RuntimeError::NotFound(id))?;
        let _ = handle.command_tx.send(RuntimeCommand::Shutdown).await;
        tracing::info!(conv_id = %id, "Session ended");
        Ok(())
    }

    /// Live sessions, after pruning ended ones
    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        let mut runtimes = self.runtimes.write().await;
        Self::prune(&mut runtimes);
        runtimes.len()
    }
}
