//! Client-side chat state.
//!
//! A [`Conversation`] holds the session list, the selected session and the messages shown for
//! it.  User messages are added locally before the backend has seen them, and a streamed reply
//! is grown in place inside an assistant placeholder until it completes or is discarded.

use std::collections::HashSet;

use crate::error::Error;
use crate::sse::TokenSink;
use crate::types::{ChatSession, Message, MessageRole, default_session};

/// Sessions and messages as the user sees them.
#[derive(Debug, Default)]
pub struct Conversation {
    sessions: Vec<ChatSession>,
    selected: Option<String>,
    messages: Vec<Message>,
    // Assistant placeholders still receiving tokens.
    open: HashSet<String>,
}

impl Conversation {
    /// An empty conversation with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session list.
    ///
    /// If no session is selected, or the selected one is gone, the default session is
    /// selected and the messages are cleared.
    pub fn set_sessions(&mut self, sessions: Vec<ChatSession>) {
        self.sessions = sessions;
        let still_there = self
            .selected
            .as_deref()
            .is_some_and(|id| self.sessions.iter().any(|s| s.id == id));
        if !still_there {
            self.selected = default_session(&self.sessions).map(|s| s.id.clone());
            self.clear_messages();
        }
    }

    /// The known sessions, in the order they were listed.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Add or replace one session, e.g. after it was created or renamed.
    pub fn upsert_session(&mut self, session: ChatSession) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.insert(0, session),
        }
    }

    /// Forget a session.  Removing the selected session leaves nothing selected.
    pub fn remove_session(&mut self, id: &str) {
        self.sessions.retain(|s| s.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
            self.clear_messages();
        }
    }

    /// Select the session with `id`.  Returns false, changing nothing, if it is unknown.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.sessions.iter().any(|s| s.id == id) {
            return false;
        }
        if self.selected.as_deref() != Some(id) {
            self.selected = Some(id.to_string());
            self.clear_messages();
        }
        true
    }

    /// The selected session.
    pub fn selected(&self) -> Option<&ChatSession> {
        let id = self.selected.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Replace the messages with the selected session's history.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.open.clear();
    }

    /// The messages of the selected session, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up one message.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn clear_messages(&mut self) {
        self.messages.clear();
        self.open.clear();
    }

    /// Record a message typed by the user and return it.
    pub fn push_user_message(&mut self, content: impl Into<String>) -> Message {
        let message = Message::user(content);
        self.messages.push(message.clone());
        message
    }

    /// Add an empty assistant message that will receive streamed tokens.  Returns its id.
    pub fn begin_assistant(&mut self) -> String {
        let message = Message::new_local(MessageRole::Assistant, "");
        let id = message.id.clone();
        self.messages.push(message);
        self.open.insert(id.clone());
        id
    }

    /// Whether the placeholder `id` still accepts tokens.
    pub fn is_open(&self, id: &str) -> bool {
        self.open.contains(id)
    }

    /// Append `token` to the placeholder `id` and return the text that was added.
    ///
    /// Tokens are joined by a single space unless the content already ends in whitespace
    /// or the token starts with it.  Returns `None` if the placeholder is complete or gone.
    pub fn append_token(&mut self, id: &str, token: &str) -> Option<&str> {
        if !self.open.contains(id) {
            return None;
        }
        let message = self.messages.iter_mut().find(|m| m.id == id)?;
        let start = message.content.len();
        if needs_separator(&message.content, token) {
            message.content.push(' ');
        }
        message.content.push_str(token);
        Some(&message.content[start..])
    }

    /// Freeze the placeholder `id`.  Returns false if it was not open.
    pub fn complete(&mut self, id: &str) -> bool {
        self.open.remove(id)
    }

    /// Remove the placeholder `id` if it never completed.  Returns false otherwise.
    pub fn discard(&mut self, id: &str) -> bool {
        if !self.open.remove(id) {
            return false;
        }
        self.messages.retain(|m| m.id != id);
        true
    }
}

fn needs_separator(content: &str, token: &str) -> bool {
    !content.is_empty()
        && !content.ends_with(char::is_whitespace)
        && !token.starts_with(char::is_whitespace)
}

/// A [`TokenSink`] that grows one assistant placeholder.
///
/// Completion freezes the placeholder and failure discards it.  An optional echo receives
/// the text added for each token, for display.
pub struct AssistantSink<'a> {
    conversation: &'a mut Conversation,
    id: String,
    echo: Option<Box<dyn FnMut(&str) + 'a>>,
    error: Option<Error>,
}

impl<'a> AssistantSink<'a> {
    /// Start a new placeholder in `conversation` and sink tokens into it.
    pub fn begin(conversation: &'a mut Conversation) -> Self {
        let id = conversation.begin_assistant();
        Self {
            conversation,
            id,
            echo: None,
            error: None,
        }
    }

    /// Call `echo` with the text added for every token.
    pub fn with_echo(mut self, echo: impl FnMut(&str) + 'a) -> Self {
        self.echo = Some(Box::new(echo));
        self
    }

    /// The placeholder's message id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The error reported to this sink, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Drop the placeholder if it is still open, e.g. after cancellation.
    pub fn abandon(self) -> Option<Error> {
        self.conversation.discard(&self.id);
        self.error
    }
}

impl TokenSink for AssistantSink<'_> {
    fn on_token(&mut self, token: &str) {
        if let Some(added) = self.conversation.append_token(&self.id, token) {
            if let Some(echo) = self.echo.as_mut() {
                echo(added);
            }
        }
    }

    fn on_complete(&mut self) {
        self.conversation.complete(&self.id);
    }

    fn on_error(&mut self, error: &Error) {
        self.conversation.discard(&self.id);
        self.error = Some(error.clone());
    }
}
