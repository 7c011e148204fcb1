mod client;
pub(crate) mod types;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AiError;
use crate::traits::{CompletionRequest, TextAgent};

use client::ClaudeClient;
use types::*;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::Config("ANTHROPIC_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Share a connection pool with the rest of the process.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key, self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

// =============================================================================
// TextAgent Implementation
// =============================================================================

#[async_trait]
impl TextAgent for Claude {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
        let chat = ChatRequest::new(&self.model)
            .system(request.system)
            .message(WireMessage::user(request.prompt))
            .max_tokens(request.max_tokens)
            .temperature(request.temperature);

        let response = self.client().chat(&chat).await?;

        if let Some(usage) = &response.usage {
            debug!(
                purpose = request.purpose,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Claude usage"
            );
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(AiError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
