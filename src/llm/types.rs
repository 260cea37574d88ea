//! Common types for completion requests

/// A single-utterance completion request
///
/// Carries only the latest user text; no history is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub text: String,
}

impl CompletionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Completion response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Reply text, or the fallback placeholder
    pub text: String,
    /// True when the response lacked the expected text path
    pub fallback: bool,
    pub usage: Usage,
}

#[cfg(test)]
impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback: false,
            usage: Usage::default(),
        }
    }
}

/// Usage statistics, when the provider reports them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}
