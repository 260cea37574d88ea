//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::CompletionClient;
use super::{
    ConversationHandle, ConversationRuntime, RuntimeError, Snapshot, SseEvent,
    DEFAULT_SESSION_IDLE_TIMEOUT,
};
use crate::conversation::Conversation;
use crate::llm::{CompletionRequest, CompletionResponse, LlmError};
use crate::state_machine::ConvState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use uuid::Uuid;

// ============================================================================
// Mock Completion Client
// ============================================================================

/// Mock completion client that returns queued responses
pub struct MockCompletionClient {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.next(request)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Gated Mock Completion Client (holds the request open)
// ============================================================================

/// Mock client whose requests block until the test opens the gate
pub struct GatedMockCompletionClient {
    inner: MockCompletionClient,
    gate: Arc<Notify>,
}

impl GatedMockCompletionClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: MockCompletionClient::new(model_id),
            gate: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: CompletionResponse) {
        self.inner.queue_response(response);
    }

    /// Let one waiting (or the next) request complete
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl CompletionClient for GatedMockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.gate.notified().await;
        self.inner.next(request)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Panicking Mock Completion Client
// ============================================================================

/// Mock client that panics mid-request
pub struct PanickingCompletionClient;

#[async_trait]
impl CompletionClient for PanickingCompletionClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        panic!("simulated panic in completion client");
    }

    fn model_id(&self) -> &str {
        "panicking"
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime<C: CompletionClient + 'static> {
    pub handle: ConversationHandle,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub client: Arc<C>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl<C: CompletionClient + 'static> TestRuntime<C> {
    pub fn with_client(client: C) -> Self {
        let client = Arc::new(client);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = ConversationRuntime::new(
            Uuid::new_v4(),
            Conversation::new(),
            client.clone(),
            command_rx,
            command_tx.clone(),
            broadcast_tx.clone(),
            DEFAULT_SESSION_IDLE_TIMEOUT,
        );

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            handle: ConversationHandle {
                command_tx,
                broadcast_tx,
            },
            broadcast_rx,
            client,
            _runtime_handle: handle,
        }
    }

    /// Send user text to the runtime
    pub async fn send_message(&self, text: &str) -> Result<(), RuntimeError> {
        self.handle.submit(text).await
    }

    /// Wait for the conversation to return to idle
    pub async fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SseEvent::StateChange {
                    state: ConvState::Idle,
                })) => return true,
                _ => continue,
            }
        }
        false
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.handle.snapshot(None).await.expect("runtime stopped")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Sender;
    use crate::llm::FALLBACK_REPLY;
    use crate::state_machine::{TransitionError, APOLOGY_REPLY};

    const WAIT: Duration = Duration::from_secs(2);

    fn pairs(snapshot: &Snapshot) -> Vec<(Sender, String)> {
        snapshot
            .messages
            .iter()
            .map(|m| (m.sender, m.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_mock_completion_client() {
        let mock = MockCompletionClient::new("test-model");
        mock.queue_response(CompletionResponse::text("Hello"));

        let request = CompletionRequest::new("Hi");
        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello");

        // Second call should fail (no more responses)
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    /// Integration test: submit "Hello", endpoint answers "Hi there!"
    #[tokio::test]
    async fn test_simple_text_response() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse::text("Hi there!"));

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("Hello").await.unwrap();

        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert!(!snapshot.pending);
        assert_eq!(
            pairs(&snapshot),
            vec![
                (Sender::User, "Hello".to_string()),
                (Sender::Bot, "Hi there!".to_string())
            ]
        );

        // Only the latest utterance is sent.
        assert_eq!(rt.client.recorded_requests(), vec![CompletionRequest::new("Hello")]);
    }

    #[tokio::test]
    async fn test_transport_failure_records_apology() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_error(LlmError::network("Connection failed: refused"));

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("Hello").await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].sender, Sender::Bot);
        assert_eq!(
            snapshot.messages[1].text,
            "Sorry, I encountered an error. Please try again."
        );
    }

    #[tokio::test]
    async fn test_fallback_reply_is_a_normal_message() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse {
            text: FALLBACK_REPLY.to_string(),
            fallback: true,
            usage: crate::llm::Usage::default(),
        });

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("Hello").await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.messages[1].text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_panic_settles_as_failure() {
        let mut rt = TestRuntime::with_client(PanickingCompletionClient);
        rt.send_message("Hello").await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].text, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_submission_while_pending_is_rejected() {
        let llm = GatedMockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse::text("first answer"));

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("first").await.unwrap();

        // The runtime acknowledged the first message, so it is pending.
        let err = rt.send_message("second").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Rejected(TransitionError::Busy)));

        let snapshot = rt.snapshot().await;
        assert!(snapshot.pending);
        assert_eq!(snapshot.messages.len(), 1);

        rt.client.release();
        assert!(rt.wait_for_idle(WAIT).await);

        let snapshot = rt.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(rt.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_submission_changes_nothing() {
        let rt = TestRuntime::with_client(MockCompletionClient::new("test-model"));

        for text in ["", "   "] {
            let err = rt.send_message(text).await.unwrap_err();
            assert!(matches!(err, RuntimeError::Rejected(TransitionError::EmptyMessage)));
        }

        let snapshot = rt.snapshot().await;
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.pending);
        assert!(rt.client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_every_turn_gets_one_reply() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse::text("a1"));
        llm.queue_error(LlmError::server_error("503"));
        llm.queue_response(CompletionResponse::text("a3"));

        let mut rt = TestRuntime::with_client(llm);
        for question in ["q1", "q2", "q3"] {
            rt.send_message(question).await.unwrap();
            assert!(rt.wait_for_idle(WAIT).await);
        }

        let snapshot = rt.snapshot().await;
        assert_eq!(
            pairs(&snapshot),
            vec![
                (Sender::User, "q1".to_string()),
                (Sender::Bot, "a1".to_string()),
                (Sender::User, "q2".to_string()),
                (Sender::Bot, APOLOGY_REPLY.to_string()),
                (Sender::User, "q3".to_string()),
                (Sender::Bot, "a3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_each_message_in_order() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse::text("Hi there!"));

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("Hello").await.unwrap();

        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + WAIT;
        while seen.len() < 2 && tokio::time::Instant::now() < deadline {
            if let Ok(Ok(SseEvent::Message { message })) =
                tokio::time::timeout(Duration::from_millis(50), rt.broadcast_rx.recv()).await
            {
                seen.push((message.sequence_id, message.sender));
            }
        }

        assert_eq!(seen, vec![(1, Sender::User), (2, Sender::Bot)]);
    }

    #[tokio::test]
    async fn test_snapshot_after_sequence() {
        let llm = MockCompletionClient::new("test-model");
        llm.queue_response(CompletionResponse::text("Hi there!"));

        let mut rt = TestRuntime::with_client(llm);
        rt.send_message("Hello").await.unwrap();
        assert!(rt.wait_for_idle(WAIT).await);

        let tail = rt.handle.snapshot(Some(1)).await.unwrap();
        assert_eq!(tail.messages.len(), 1);
        assert_eq!(tail.messages[0].text, "Hi there!");
        assert_eq!(tail.last_sequence_id, 2);
    }

    // ------------------------------------------------------------------------
    // Through the real Gemini client against a mocked endpoint
    // ------------------------------------------------------------------------

    mod over_http {
        use super::*;
        use crate::llm::{GeminiService, LlmConfig, LlmService};
        use crate::runtime::ServiceCompletionClient;
        use serde_json::json;
        use wiremock::matchers::{body_json, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const MODEL_PATH: &str = "/v1beta/models/test-model:generateContent";

        fn gemini_runtime(server: &MockServer) -> TestRuntime<ServiceCompletionClient> {
            let config = LlmConfig {
                api_key: "test-api-key".to_string(),
                model: "test-model".to_string(),
                base_url: format!("{}/v1beta", server.uri()),
            };
            let service: Arc<dyn LlmService> = Arc::new(GeminiService::new(&config).unwrap());
            TestRuntime::with_client(ServiceCompletionClient::new(service))
        }

        #[tokio::test]
        async fn test_hello_round_trip() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .and(query_param("key", "test-api-key"))
                .and(body_json(json!({ "contents": [{ "parts": [{ "text": "Hello" }] }] })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "Hi there!" }] } }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let mut rt = gemini_runtime(&server);
            rt.send_message("Hello").await.unwrap();
            assert!(rt.wait_for_idle(WAIT).await);

            let snapshot = rt.snapshot().await;
            assert!(!snapshot.pending);
            assert_eq!(
                pairs(&snapshot),
                vec![
                    (Sender::User, "Hello".to_string()),
                    (Sender::Bot, "Hi there!".to_string())
                ]
            );
        }

        #[tokio::test]
        async fn test_missing_candidates_become_fallback_reply() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(&server)
                .await;

            let mut rt = gemini_runtime(&server);
            rt.send_message("Hello").await.unwrap();
            assert!(rt.wait_for_idle(WAIT).await);

            let snapshot = rt.snapshot().await;
            assert_eq!(snapshot.messages.len(), 2);
            assert_eq!(snapshot.messages[1].text, "I couldn't process that request.");
        }

        #[tokio::test]
        async fn test_server_error_becomes_apology() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .expect(1)
                .mount(&server)
                .await;

            let mut rt = gemini_runtime(&server);
            rt.send_message("Hello").await.unwrap();
            assert!(rt.wait_for_idle(WAIT).await);

            let snapshot = rt.snapshot().await;
            assert_eq!(snapshot.messages.len(), 2);
            assert_eq!(
                snapshot.messages[1].text,
                "Sorry, I encountered an error. Please try again."
            );
        }
    }
}
