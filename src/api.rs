//! HTTP API for the chat page
//!
//! JSON endpoints for sessions and chat, an SSE stream per session, and the
//! embedded page itself.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::{CompletionClient, RuntimeManager};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
}

impl AppState {
    pub fn new(client: Arc<dyn CompletionClient>, session_idle_timeout: Duration) -> Self {
        Self {
            runtime: Arc::new(RuntimeManager::new(client, session_idle_timeout)),
        }
    }
}
