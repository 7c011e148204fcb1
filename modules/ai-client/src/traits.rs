use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// Completion Request
// =============================================================================

/// A single-turn prompt. `purpose` is a short label ("lead_scoring", ...) used
/// for tracing and for routing canned responses in tests.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub purpose: &'static str,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(purpose: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: None,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// =============================================================================
// TextAgent Trait
// =============================================================================

/// Dyn-compatible text completion. Returns the model's raw text; callers own
/// the parsing.
#[async_trait]
pub trait TextAgent: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError>;

    fn model(&self) -> &str;
}
