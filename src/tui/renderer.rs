//! Terminal rendering with markdown support

use crossterm::style::{Color, Stylize};
use std::io::Write;
use termimad::MadSkin;

use super::theme::Theme;
use crate::annotations::AnnotationTable;

/// Terminal renderer with markdown and styled output
pub struct TerminalRenderer {
    theme: Theme,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let theme = Theme::default();
        let skin = Self::build_skin(&theme);
        Self { theme, skin }
    }

    fn build_skin(theme: &Theme) -> MadSkin {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(to_termimad_color(theme.title));
        skin.bold.set_fg(to_termimad_color(Color::White));
        skin.italic.set_fg(to_termimad_color(Color::DarkYellow));
        skin.inline_code.set_fg(to_termimad_color(Color::Green));
        skin.code_block.set_fg(to_termimad_color(Color::Green));
        skin
    }

    /// Render the title banner
    pub fn render_banner(&self, version: &str, model: &str) {
        println!();
        println!("  {}", "HumeGPT".with(self.theme.title).bold());
        println!(
            "  {}",
            "An emotionally intelligent AI".with(self.theme.subtitle)
        );
        println!(
            "  {} {}  {} {}",
            "v".with(self.theme.dim),
            version.with(self.theme.dim),
            "model:".with(self.theme.dim),
            model.with(self.theme.dim),
        );
        println!();
    }

    /// Render a streaming text delta (raw, no markdown processing)
    pub fn render_delta(&self, text: &str) {
        print!("{}", text.with(self.theme.assistant));
        let _ = std::io::stdout().flush();
    }

    /// Finish the streamed response, re-rendering it as markdown if it has any
    pub fn render_markdown(&self, content: &str) {
        if has_markdown_elements(content) {
            println!();
            println!();
            self.skin.print_text(content);
        } else {
            // Content was already printed during streaming, just add newline
            println!();
        }
    }

    /// Render the emotion annotation table
    pub fn render_annotations(&self, table: &AnnotationTable) {
        if table.is_empty() {
            return;
        }

        println!();
        for row in table.rows() {
            println!(
                "  {} {} {}",
                row.timestamp.as_str().with(self.theme.timestamp),
                "|".with(self.theme.dim),
                row.emotion.as_str().with(self.theme.emotion),
            );
            println!("  {}", row.words);
            println!();
        }
    }

    /// Render a warning message
    pub fn render_warning(&self, msg: &str) {
        println!(
            "  {} {}",
            "!".with(self.theme.warning),
            msg.with(self.theme.warning)
        );
    }

    /// Render an error message
    pub fn render_error(&self, msg: &str) {
        eprintln!(
            "  {} {}",
            "\u{2717}".with(self.theme.error),
            msg.with(self.theme.error)
        );
    }

    /// Render info text
    pub fn render_info(&self, msg: &str) {
        println!("  {}", msg.with(self.theme.dim));
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if content has markdown elements worth re-rendering
fn has_markdown_elements(content: &str) -> bool {
    content.contains("```")
        || content.contains("## ")
        || content.contains("# ")
        || content.contains("**")
        || content.contains("| ")
        || content.contains("- [")
}

/// Convert crossterm Color to termimad color
fn to_termimad_color(color: Color) -> termimad::crossterm::style::Color {
    // termimad re-exports crossterm, so these types are compatible
    match color {
        Color::Black => termimad::crossterm::style::Color::Black,
        Color::DarkGrey => termimad::crossterm::style::Color::DarkGrey,
        Color::Red => termimad::crossterm::style::Color::Red,
        Color::DarkRed => termimad::crossterm::style::Color::DarkRed,
        Color::Green => termimad::crossterm::style::Color::Green,
        Color::DarkGreen => termimad::crossterm::style::Color::DarkGreen,
        Color::Yellow => termimad::crossterm::style::Color::Yellow,
        Color::DarkYellow => termimad::crossterm::style::Color::DarkYellow,
        Color::Blue => termimad::crossterm::style::Color::Blue,
        Color::DarkBlue => termimad::crossterm::style::Color::DarkBlue,
        Color::Magenta => termimad::crossterm::style::Color::Magenta,
        Color::DarkMagenta => termimad::crossterm::style::Color::DarkMagenta,
        Color::Cyan => termimad::crossterm::style::Color::Cyan,
        Color::DarkCyan => termimad::crossterm::style::Color::DarkCyan,
        Color::White => termimad::crossterm::style::Color::White,
        Color::Grey => termimad::crossterm::style::Color::Grey,
        _ => termimad::crossterm::style::Color::Reset,
    }
}
