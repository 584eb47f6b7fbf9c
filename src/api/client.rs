//! HTTP client for the chat-completions endpoint

use super::streaming::{spawn_reader, FragmentStream, ReadOptions, StreamingProvider};
use super::{ApiConfig, ApiError, ChatRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

/// Streaming chat-completion client for OpenAI-compatible APIs
pub struct ChatClient {
    config: ApiConfig,
    client: Client,
}

impl ChatClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The bearer credential, checked before anything touches the network
    fn credential(&self) -> Result<&str, ApiError> {
        match self.config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ApiError::Configuration(
                "API key not found. Set OPENAI_API_KEY or openai.api_key in the config file"
                    .to_string(),
            )),
        }
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            read_timeout: self.config.read_timeout(),
            on_malformed: self.config.on_malformed,
        }
    }
}

#[async_trait]
impl StreamingProvider for ChatClient {
    async fn send_streaming(&self, request: ChatRequest) -> Result<FragmentStream, ApiError> {
        let api_key = self.credential()?;
        let url = self.config.endpoint();

        // Enable streaming in the request body
        let body = request.streaming();

        info!(
            "Sending streaming request to {} (model: {}, {} messages)",
            url,
            body.model,
            body.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::Provider(format!("{}: {}", status, error_text)));
        }

        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(ApiError::Transport(format!(
                "No response body ({})",
                status
            )));
        }

        debug!("Response headers received ({}), reading body", status);

        Ok(spawn_reader(response.bytes_stream(), self.read_options()))
    }
}
