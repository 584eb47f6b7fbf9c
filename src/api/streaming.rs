//! Streaming response support
//!
//! A spawned task reads the response body, runs it through the UTF-8
//! decoder, the line buffer and the SSE parser, and pushes [`StreamChunk`]s
//! into a bounded channel. The consumer pulls them through a
//! [`FragmentStream`], which also carries the handle for cancelling the read.

use super::decoder::Utf8StreamDecoder;
use super::sse::{parse_sse_line, LineBuffer, SseEvent};
use super::{ApiError, ChatRequest, MalformedPolicy};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// One item delivered by a streaming response
#[derive(Debug)]
pub enum StreamChunk {
    /// A piece of generated text
    Fragment(String),
    /// A malformed line was skipped; the stream continues
    Warning(ApiError),
    /// The transport finished normally
    Done,
    /// The caller cancelled the read
    Cancelled,
    /// The stream stopped on an error
    Error(ApiError),
}

impl StreamChunk {
    /// Whether this is the last item the reader will send
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamChunk::Done | StreamChunk::Cancelled | StreamChunk::Error(_)
        )
    }
}

/// How a stream ended, as seen by the consumer
#[derive(Debug)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(ApiError),
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled)
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            StreamOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Cloneable handle that stops a running stream
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    stream: Weak<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the [`FragmentStream`] this handle came from still exists
    pub fn is_attached(&self) -> bool {
        self.stream.strong_count() > 0
    }
}

/// Lazy, non-restartable sequence of chunks from one response.
///
/// Dropping it stops the reader task.
#[derive(Debug)]
pub struct FragmentStream {
    chunks: ReceiverStream<StreamChunk>,
    token: CancellationToken,
    alive: Arc<()>,
    _stop_on_drop: DropGuard,
}

impl FragmentStream {
    pub fn new(rx: mpsc::Receiver<StreamChunk>, token: CancellationToken) -> Self {
        Self {
            chunks: ReceiverStream::new(rx),
            _stop_on_drop: token.clone().drop_guard(),
            token,
            alive: Arc::new(()),
        }
    }

    /// Wait for the next chunk. `None` once the reader has gone away.
    pub async fn next(&mut self) -> Option<StreamChunk> {
        self.chunks.next().await
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.token.clone(),
            stream: Arc::downgrade(&self.alive),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Options for the body read loop
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Give up when a single read takes longer than this
    pub read_timeout: Option<Duration>,
    pub on_malformed: MalformedPolicy,
}

/// Trait for providers that support streaming responses
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Send a request and return the stream of its chunks.
    /// Setup failures (credential, connection, HTTP status) are returned
    /// here; everything after the headers arrives through the stream.
    async fn send_streaming(&self, request: ChatRequest) -> Result<FragmentStream, ApiError>;
}

/// Spawn the read loop for a response body.
///
/// The body is any stream of byte chunks, which lets tests feed chunk
/// boundaries directly.
pub fn spawn_reader<S, B, E>(body: S, options: ReadOptions) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let token = CancellationToken::new();
    let reader_token = token.clone();

    tokio::spawn(async move {
        read_event_stream(body, &tx, options, &reader_token).await;
    });

    FragmentStream::new(rx, token)
}

async fn read_event_stream<S, B, E>(
    body: S,
    tx: &mpsc::Sender<StreamChunk>,
    options: ReadOptions,
    token: &CancellationToken,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = Utf8StreamDecoder::new();
    let mut lines = LineBuffer::new();
    let mut chunks_read = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Stream cancelled after {} chunks", chunks_read);
                let _ = tx.send(StreamChunk::Cancelled).await;
                return;
            }
            next = next_chunk(&mut body, options.read_timeout) => next,
        };

        let bytes = match next {
            Ok(Some(Ok(bytes))) => bytes,
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                let _ = tx
                    .send(StreamChunk::Error(ApiError::Transport(format!(
                        "Stream error: {}",
                        e
                    ))))
                    .await;
                return;
            }
            Err(_) => {
                let secs = options.read_timeout.map(|d| d.as_secs()).unwrap_or_default();
                let _ = tx
                    .send(StreamChunk::Error(ApiError::Transport(format!(
                        "No data received for {}s",
                        secs
                    ))))
                    .await;
                return;
            }
        };
        chunks_read += 1;

        let text = decoder.decode(bytes.as_ref());
        for line in lines.push(&text) {
            if !dispatch_line(&line, tx, options.on_malformed).await {
                return;
            }
        }
    }

    // End of body: flush the decoder and any unterminated last line
    let tail = decoder.finish();
    let mut rest = lines.push(&tail);
    rest.extend(lines.finish());
    for line in rest {
        if !dispatch_line(&line, tx, options.on_malformed).await {
            return;
        }
    }

    debug!("Stream finished after {} chunks", chunks_read);
    let _ = tx.send(StreamChunk::Done).await;
}

async fn next_chunk<T>(
    body: &mut T,
    timeout: Option<Duration>,
) -> Result<Option<T::Item>, tokio::time::error::Elapsed>
where
    T: Stream + Unpin,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, body.next()).await,
        None => Ok(body.next().await),
    }
}

/// Handle one line. Returns false when reading should stop.
async fn dispatch_line(
    line: &str,
    tx: &mpsc::Sender<StreamChunk>,
    on_malformed: MalformedPolicy,
) -> bool {
    match parse_sse_line(line) {
        Ok(None) => true,
        // A send error means the receiver was dropped
        Ok(Some(SseEvent::Fragment(text))) => tx.send(StreamChunk::Fragment(text)).await.is_ok(),
        Ok(Some(SseEvent::Done)) => {
            debug!("Received {} sentinel", super::sse::DONE_SENTINEL);
            true
        }
        Ok(Some(SseEvent::ProviderError(msg))) => {
            let _ = tx.send(StreamChunk::Error(ApiError::Provider(msg))).await;
            false
        }
        Err(err) => match on_malformed {
            MalformedPolicy::Skip => {
                warn!("Skipping malformed stream line: {}", err);
                tx.send(StreamChunk::Warning(err)).await.is_ok()
            }
            MalformedPolicy::Abort => {
                let _ = tx.send(StreamChunk::Error(err)).await;
                false
            }
        },
    }
}
