//! HumeGPT - stream chat completions into a terminal session
//!
//! Starting a session sends a chat-completion request with streaming enabled
//! and renders the response as it arrives, followed by a table of
//! timestamped emotion annotations.
//!
//! ## Key Features
//!
//! - **Streaming client**: incremental UTF-8 decoding and SSE parsing of the response body
//! - **Cancellation**: stop a running stream from the caller without losing received text
//! - **Session state**: an explicit value passed into and returned from the stream loop
//! - **Annotations**: placeholder table and parser for the timestamped emotion map

pub mod annotations;
pub mod api;
pub mod config;
pub mod session;
pub mod tui;

pub use annotations::{AnnotationError, AnnotationTable, EmotionAnnotation};
pub use api::{
    ApiConfig, ApiError, CancelHandle, ChatClient, ChatRequest, FragmentStream, MalformedPolicy,
    Message, Role, StreamChunk, StreamOutcome, StreamingProvider,
};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use session::{drive, Session, SessionState};
