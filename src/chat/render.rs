//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so the REPL does not print
//! directly.  The default implementation writes to stdout with optional ANSI styling.

use std::io::{self, Stdout, Write};

use time::OffsetDateTime;
use time::macros::format_description;

use crate::types::{ChatSession, Message, MessageRole};

/// ANSI escape code for dim text (used for timestamps and ids).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for the selected session).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for role labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for login prompts).
const ANSI_YELLOW: &str = "\x1b[33m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a chunk of streamed reply text.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Tell the user to log in at `url`.
    fn print_login_required(&mut self, url: &str);

    /// Print the session list, marking `selected`.
    fn print_sessions(&mut self, sessions: &[ChatSession], selected: Option<&str>);

    /// Print one complete message.
    fn print_message(&mut self, message: &Message);

    /// Called when a streamed reply is complete.
    fn finish_response(&mut self);

    /// Called when a streamed reply is stopped by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn print_login_required(&mut self, url: &str) {
        let banner = self.styled(ANSI_YELLOW, "Login required.");
        println!("{banner} Log in at {url} and restart the chat.");
    }

    fn print_sessions(&mut self, sessions: &[ChatSession], selected: Option<&str>) {
        if sessions.is_empty() {
            println!("No sessions yet; type a message or use /new.");
            return;
        }
        for (index, session) in sessions.iter().enumerate() {
            let is_selected = selected == Some(session.id.as_str());
            let line = session_line(index + 1, session, is_selected);
            if is_selected {
                println!("{}", self.styled(ANSI_BOLD, &line));
            } else {
                println!("{line}");
            }
        }
    }

    fn print_message(&mut self, message: &Message) {
        let label = self.styled(ANSI_CYAN, &format!("{}:", message.role));
        let stamp = self.styled(ANSI_DIM, &format_timestamp(message.timestamp));
        println!("{stamp} {label} {}", message.content);
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        println!("\n[interrupted]");
        self.flush();
    }
}

/// The prompt label shown before a streamed reply.
pub fn reply_prefix(role: MessageRole) -> String {
    format!("{role}: ")
}

fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

fn session_line(number: usize, session: &ChatSession, selected: bool) -> String {
    let marker = if selected { '*' } else { ' ' };
    format!(
        "{marker} {number:>2}. {} ({}, updated {})",
        session.title,
        session.id,
        format_timestamp(session.updated_at)
    )
}
