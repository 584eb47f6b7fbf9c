//! Streaming chat-completion client
//!
//! Sends a chat request with `stream: true`, decodes the server-sent-event
//! body as it arrives and hands text fragments to the caller over a channel.

mod client;
mod decoder;
mod request;
mod sse;
mod streaming;

pub use client::ChatClient;
pub use decoder::Utf8StreamDecoder;
pub use request::{ChatRequest, Message, Role};
pub use sse::{parse_sse_line, LineBuffer, SseEvent};
pub use streaming::{
    spawn_reader, CancelHandle, FragmentStream, ReadOptions, StreamChunk, StreamOutcome,
    StreamingProvider,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default OpenAI-compatible API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Protocol error: {message}")]
    Protocol { message: String, payload: String },

    #[error("A request is already in flight for this session")]
    Busy,
}

impl ApiError {
    /// Whether the failure happened on the wire rather than in our own setup or parsing
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Http(_) | ApiError::Provider(_)
        )
    }
}

/// What to do with a `data:` line whose payload is not valid JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log a warning, report it to the consumer and keep reading
    #[default]
    Skip,
    /// Stop the stream with a protocol error
    Abort,
}

impl std::str::FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(MalformedPolicy::Skip),
            "abort" => Ok(MalformedPolicy::Abort),
            other => Err(format!("unknown policy '{}', expected skip or abort", other)),
        }
    }
}

/// Connection settings for the chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer credential; `None` or blank fails before any request is sent
    pub api_key: Option<String>,
    /// API root, `/chat/completions` is appended
    pub base_url: String,
    /// Idle timeout per body read in seconds, 0 disables it
    pub read_timeout_secs: u64,
    pub on_malformed: MalformedPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            read_timeout_secs: 60,
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Full URL of the chat-completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}
