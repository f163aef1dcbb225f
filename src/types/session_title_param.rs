use serde::{Deserialize, Serialize};

/// Default title for sessions created without one.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Request body for creating or renaming a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTitleParam {
    /// The session title.
    pub title: String,
}

impl SessionTitleParam {
    /// Create a new title body.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for SessionTitleParam {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TITLE)
    }
}
