//! Listening indicator for the session view

use indicatif::{ProgressBar, ProgressStyle};

/// A bars-style spinner shown until the first fragment arrives
pub struct ListeningSpinner {
    bar: ProgressBar,
    active: bool,
}

impl ListeningSpinner {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner:.blue} {msg}") {
            bar.set_style(style.tick_strings(&[
                "\u{2581}\u{2583}\u{2585}",
                "\u{2583}\u{2585}\u{2587}",
                "\u{2585}\u{2587}\u{2585}",
                "\u{2587}\u{2585}\u{2583}",
                "\u{2585}\u{2583}\u{2581}",
                "\u{2583}\u{2581}\u{2583}",
                "\u{2581}\u{2581}\u{2581}",
            ]));
        }
        Self { bar, active: false }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
        self.bar
            .enable_steady_tick(std::time::Duration::from_millis(100));
        self.active = true;
    }

    /// Stop and clear the spinner
    pub fn stop(&mut self) {
        if self.active {
            self.bar.finish_and_clear();
            self.active = false;
        }
    }

    /// Check if the spinner is currently active
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for ListeningSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ListeningSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let mut spinner = ListeningSpinner::new();
        assert!(!spinner.is_active());
        spinner.start("Listening...");
        assert!(spinner.is_active());
        spinner.stop();
        assert!(!spinner.is_active());
        spinner.stop();
        assert!(!spinner.is_active());
    }
}
