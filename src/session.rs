//! Session state and the loop that feeds a stream into it
//!
//! [`SessionState`] is a plain value: [`drive`] takes it, appends every
//! fragment in arrival order, and hands it back together with the
//! [`StreamOutcome`]. [`Session`] adds the one-request-at-a-time rule on top.

use crate::api::{
    ApiError, CancelHandle, ChatRequest, FragmentStream, StreamChunk, StreamOutcome,
    StreamingProvider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What the view needs to render a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_streaming: bool,
    pub accumulated_text: String,
    /// Malformed lines skipped during the current stream
    pub warnings: Vec<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a new stream as started and clear the previous text
    pub fn begin(&mut self) {
        self.is_streaming = true;
        self.accumulated_text.clear();
        self.warnings.clear();
    }

    pub fn append(&mut self, fragment: &str) {
        self.accumulated_text.push_str(fragment);
    }

    pub fn finish(&mut self) {
        self.is_streaming = false;
    }
}

/// Consume a fragment stream into `state`.
///
/// `on_fragment` sees each fragment right after it is appended. Warnings
/// about skipped lines are logged and kept in `state.warnings`. Text received
/// before a failure or cancellation stays in the returned state.
pub async fn drive<F>(
    mut stream: FragmentStream,
    mut state: SessionState,
    on_fragment: F,
) -> (SessionState, StreamOutcome)
where
    F: FnMut(&str),
{
    state.begin();
    let outcome = pump(&mut stream, &mut state, on_fragment).await;
    (state, outcome)
}

/// Read chunks into `state` until a terminal one. Updates land in `state` as
/// they arrive, so a caller that stops polling keeps what was read.
async fn pump<F>(
    stream: &mut FragmentStream,
    state: &mut SessionState,
    mut on_fragment: F,
) -> StreamOutcome
where
    F: FnMut(&str),
{
    let mut fragments = 0usize;

    let outcome = loop {
        match stream.next().await {
            Some(StreamChunk::Fragment(text)) => {
                fragments += 1;
                state.append(&text);
                on_fragment(&text);
            }
            Some(StreamChunk::Warning(err)) => {
                warn!("Stream warning: {}", err);
                state.warnings.push(err.to_string());
            }
            Some(StreamChunk::Done) => break StreamOutcome::Completed,
            Some(StreamChunk::Cancelled) => break StreamOutcome::Cancelled,
            Some(StreamChunk::Error(err)) => break StreamOutcome::Failed(err),
            None => {
                break StreamOutcome::Failed(ApiError::Transport(
                    "Stream closed without a completion signal".to_string(),
                ))
            }
        }
    };

    state.finish();
    debug!(
        "Stream ended: {:?} ({} fragments, {} bytes)",
        outcome,
        fragments,
        state.accumulated_text.len()
    );
    outcome
}

/// A chat session over one provider, allowing a single request in flight
pub struct Session<P> {
    provider: P,
    state: SessionState,
    cancel: Option<CancelHandle>,
}

impl<P: StreamingProvider> Session<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: SessionState::new(),
            cancel: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True while a stream returned by [`Session::open`] is still alive.
    /// A stream dropped before its end no longer counts.
    pub fn is_streaming(&self) -> bool {
        self.state.is_streaming && self.cancel.as_ref().is_some_and(CancelHandle::is_attached)
    }

    /// Send `request` and mark the session as streaming.
    ///
    /// Fails with [`ApiError::Busy`] while an earlier stream is still open.
    pub async fn open(&mut self, request: ChatRequest) -> Result<FragmentStream, ApiError> {
        if self.is_streaming() {
            return Err(ApiError::Busy);
        }
        if self.state.is_streaming {
            debug!("Previous stream was dropped before it ended");
            self.state.finish();
            self.cancel = None;
        }

        let stream = self.provider.send_streaming(request).await?;
        self.state.begin();
        self.cancel = Some(stream.cancel_handle());
        info!("Session started");
        Ok(stream)
    }

    /// Read an opened stream to the end.
    ///
    /// If this future is dropped early, the text read so far stays in
    /// [`Session::state`] and the stream is stopped.
    pub async fn consume<F>(&mut self, mut stream: FragmentStream, on_fragment: F) -> StreamOutcome
    where
        F: FnMut(&str),
    {
        let outcome = pump(&mut stream, &mut self.state, on_fragment).await;
        self.cancel = None;
        outcome
    }

    /// Open and consume in one go. Setup errors come back as `Failed`.
    pub async fn run<F>(&mut self, request: ChatRequest, on_fragment: F) -> StreamOutcome
    where
        F: FnMut(&str),
    {
        match self.open(request).await {
            Ok(stream) => self.consume(stream, on_fragment).await,
            Err(err) => StreamOutcome::Failed(err),
        }
    }

    /// Handle for stopping the current stream, if one is open
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.cancel.clone()
    }

    /// Stop the current stream. Returns false when nothing was streaming.
    pub fn stop(&self) -> bool {
        match &self.cancel {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }
}
