//! Terminal front end for a session
//!
//! Shows the listening spinner until the first fragment, prints fragments as
//! they arrive, lets Ctrl-C stop the session, and finishes with any skipped
//! line warnings and the annotation table.

pub mod renderer;
pub mod spinner;
pub mod theme;

use crate::annotations::AnnotationTable;
use crate::api::{ChatRequest, StreamOutcome, StreamingProvider};
use crate::session::Session;

use renderer::TerminalRenderer;
use spinner::ListeningSpinner;
use tracing::{debug, info};

/// Renders one session to the terminal
pub struct SessionView {
    renderer: TerminalRenderer,
    annotations: Option<AnnotationTable>,
}

impl SessionView {
    pub fn new() -> Self {
        Self {
            renderer: TerminalRenderer::new(),
            annotations: Some(AnnotationTable::placeholder()),
        }
    }

    /// Replace the table shown after the response; `None` hides it
    pub fn with_annotations(mut self, annotations: Option<AnnotationTable>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn renderer(&self) -> &TerminalRenderer {
        &self.renderer
    }

    /// Start a session, stream its response and render the result
    pub async fn run<P: StreamingProvider>(
        &self,
        session: &mut Session<P>,
        request: ChatRequest,
    ) -> StreamOutcome {
        let mut spinner = ListeningSpinner::new();
        spinner.start("Listening...");

        let stream = match session.open(request).await {
            Ok(stream) => stream,
            Err(e) => {
                spinner.stop();
                self.renderer.render_error(&format!("Request failed: {}", e));
                return StreamOutcome::Failed(e);
            }
        };

        // Ctrl-C stops the session instead of killing the process
        let cancel = stream.cancel_handle();
        let stop_watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Stop requested");
                cancel.cancel();
            }
        });

        let renderer = &self.renderer;
        let mut first_fragment = true;
        let outcome = session
            .consume(stream, |fragment| {
                if first_fragment {
                    spinner.stop();
                    renderer.render_info("Press Ctrl-C to stop the session");
                    println!();
                    print!("  ");
                    first_fragment = false;
                }
                renderer.render_delta(fragment);
            })
            .await;

        stop_watcher.abort();
        spinner.stop();

        let text = &session.state().accumulated_text;
        debug!("Session text: {} bytes", text.len());

        match &outcome {
            StreamOutcome::Completed => {
                if text.is_empty() {
                    self.renderer.render_info("No response received.");
                } else {
                    self.renderer.render_markdown(text);
                }
            }
            StreamOutcome::Cancelled => {
                if !text.is_empty() {
                    println!();
                }
                self.renderer.render_warning("Session stopped");
            }
            StreamOutcome::Failed(e) => {
                if !text.is_empty() {
                    println!();
                }
                self.renderer.render_error(&format!("Stream error: {}", e));
            }
        }

        for warning in &session.state().warnings {
            self.renderer.render_warning(&format!("Skipped line: {}", warning));
        }

        if let Some(table) = &self.annotations {
            self.renderer.render_annotations(table);
        }

        outcome
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::new()
    }
}
