//! Terminal theme and color definitions

use crossterm::style::Color;

/// Theme colors for the session view
pub struct Theme {
    /// Color for the title banner
    pub title: Color,
    /// Color for the subtitle under the title
    pub subtitle: Color,
    /// Color for streamed response text
    pub assistant: Color,
    /// Color for error messages
    pub error: Color,
    /// Color for warnings (stopped sessions, skipped lines)
    pub warning: Color,
    /// Color for dim/secondary info
    pub dim: Color,
    /// Color for annotation timestamps
    pub timestamp: Color,
    /// Color for annotation emotion labels
    pub emotion: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Color::Magenta,
            subtitle: Color::DarkGrey,
            assistant: Color::White,
            error: Color::Red,
            warning: Color::Yellow,
            dim: Color::DarkGrey,
            timestamp: Color::Cyan,
            emotion: Color::Blue,
        }
    }
}
