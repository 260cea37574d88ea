//! Google Gemini provider implementation

use super::types::{CompletionRequest, CompletionResponse, Usage};
use super::{LlmConfig, LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// Reply used when a successful response has no text at the expected path
pub const FALLBACK_REPLY: &str = "I couldn't process that request.";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        // No timeout: a request runs until the transport settles it.
        let client = Client::builder()
            .user_agent(concat!("lynx-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            model_id: config.model.clone(),
        })
    }

    fn translate_request(request: &CompletionRequest) -> GeminiRequest<'_> {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: &request.text,
                }],
            }],
        }
    }

    /// Map a decoded body to a response, degrading to the fallback text
    /// when `candidates[0].content.parts[0].text` is absent or empty.
    fn normalize_response(body: &Value) -> CompletionResponse {
        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        let usage = body
            .get("usageMetadata")
            .map(|u| Usage {
                input_tokens: u.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0),
                output_tokens: u
                    .get("candidatesTokenCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            })
            .unwrap_or_default();

        CompletionResponse {
            text: text.unwrap_or(FALLBACK_REPLY).to_string(),
            fallback: text.is_none(),
            usage,
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                // Strip the URL so the key in the query string never reaches logs.
                let e = e.without_url();
                if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {}", e.without_url())))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(LlmError::from_status(status.as_u16(), message));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::decode(format!("Failed to parse response: {e}")))?;

        Ok(Self::normalize_response(&value))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}
