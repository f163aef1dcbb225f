use serde::{Deserialize, Serialize};

/// Request body for sending a message, streaming or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageParam {
    /// The user's message text.
    pub message: String,
}

impl SendMessageParam {
    /// Create a new message body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
