//! Interactive chat front end.
//!
//! This module provides the pieces of the `chatwire-chat` REPL that are worth testing on
//! their own:
//!
//! - [`commands`]: slash command parsing
//! - [`render`]: terminal output

mod commands;
mod render;

pub use commands::{ChatCommand, help_text, parse_command};
pub use render::{PlainTextRenderer, Renderer, reply_prefix};
