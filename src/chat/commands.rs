//! Slash command parsing for the chat application.
//!
//! Input that starts with `/` controls sessions and the login state instead of being sent
//! to the backend as a message.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// List sessions, marking the selected one.
    Sessions,

    /// Create a session, optionally with a title, and select it.
    New(Option<String>),

    /// Select a session by id or by its 1-based position in the list.
    Switch(String),

    /// Rename the selected session.
    Rename(String),

    /// Delete a session by id or position.  `None` deletes the selected session.
    Delete(Option<String>),

    /// Show the selected session's messages.
    History,

    /// Show the logged-in user.
    WhoAmI,

    /// Log out and forget local credentials.
    Logout,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent
/// as a message.
///
/// # Examples
///
/// ```
/// # use chatwire::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/rename Trip plans").is_some());
/// assert!(parse_command("Hello there").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "sessions" | "ls" => ChatCommand::Sessions,
        "new" => ChatCommand::New(argument.map(|s| s.to_string())),
        "switch" | "use" => match argument {
            Some(target) => ChatCommand::Switch(target.to_string()),
            None => ChatCommand::Invalid("/switch requires a session id or number".to_string()),
        },
        "rename" => match argument {
            Some(title) => ChatCommand::Rename(title.to_string()),
            None => ChatCommand::Invalid("/rename requires a title".to_string()),
        },
        "delete" | "rm" => ChatCommand::Delete(argument.map(|s| s.to_string())),
        "history" => ChatCommand::History,
        "whoami" | "user" => ChatCommand::WhoAmI,
        "logout" => ChatCommand::Logout,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("unknown command /{other}; try /help")),
    };

    Some(result)
}

/// Returns the help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /sessions              List sessions (* marks the selected one)
  /new [title]           Create a session and switch to it
  /switch <id|n>         Switch to a session by id or list number
  /rename <title>        Rename the selected session
  /delete [id|n]         Delete a session (default: the selected one)
  /history               Show the selected session's messages
  /whoami                Show the logged-in user
  /logout                Log out and forget local credentials
  /help                  Show this help message
  /quit                  Exit the chat

Anything else is sent to the selected session.  Ctrl+C stops a reply in progress."#
}
