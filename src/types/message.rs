use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// A message written by the user.
    User,
    /// A message produced by the assistant.
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier.  Server-assigned for history, locally generated for messages
    /// the user has just typed.
    pub id: String,

    /// The text of the message.
    pub content: String,

    /// Who wrote the message.
    pub role: MessageRole,

    /// When the message was written.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    /// Create a message with a fresh local id and the current time.
    pub fn new_local(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a user message with a fresh local id.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new_local(MessageRole::User, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn message_deserialization() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "content": "Hello",
            "role": "assistant",
            "timestamp": "2024-01-02T10:15:00",
        }))
        .unwrap();

        assert_eq!(message.id, "m1");
        assert_eq!(message.content, "Hello");
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.timestamp, datetime!(2024-01-02 10:15:00 UTC));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = serde_json::from_value::<Message>(json!({
            "id": "m1",
            "content": "Hello",
            "role": "system",
            "timestamp": "2024-01-02",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn local_messages_get_unique_ids() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, MessageRole::User);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }
}
