use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Message;

/// A persisted conversation thread.
///
/// Sessions are owned by the backend; the client never invents an id and only ever changes
/// the title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Opaque session identifier assigned by the backend.
    pub id: String,

    /// Human-readable title.
    pub title: String,

    /// Time at which the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Time of the last change to the session, including new messages.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,

    /// Messages embedded by endpoints that return the full session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// Pick the session a freshly opened chat view should resume.
///
/// This is the most recently updated session.  The backend already lists sessions
/// newest-updated first, so on ties the earlier entry wins.
pub fn default_session(sessions: &[ChatSession]) -> Option<&ChatSession> {
    sessions.iter().reduce(|best, candidate| {
        if candidate.updated_at > best.updated_at {
            candidate
        } else {
            best
        }
    })
}
