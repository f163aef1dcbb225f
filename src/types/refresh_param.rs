use serde::{Deserialize, Serialize};

/// Request body for refreshing client-held tokens.
///
/// Only sent in bearer mode; in cookie mode the refresh token travels as a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshParam {
    /// The current refresh token.
    pub refresh_token: String,
}

impl RefreshParam {
    /// Create a new refresh body.
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }
}
