use serde::{Deserialize, Serialize};

/// An access/refresh credential pair.
///
/// Both halves are opaque bearer strings.  A pair only exists when both halves are present
/// and non-empty; anything less is treated as no credentials at all.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "accessToken")]
    access: String,
    #[serde(rename = "refreshToken")]
    refresh: String,
}

impl CredentialPair {
    /// Create a pair, or `None` if either half is empty.
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Option<Self> {
        let access = access.into();
        let refresh = refresh.into();
        if access.is_empty() || refresh.is_empty() {
            return None;
        }
        Some(Self { access, refresh })
    }

    /// Create a pair from optional halves, or `None` if either is missing or empty.
    pub fn from_parts(access: Option<String>, refresh: Option<String>) -> Option<Self> {
        match (access, refresh) {
            (Some(access), Some(refresh)) => Self::new(access, refresh),
            _ => None,
        }
    }

    /// The access token.
    pub fn access(&self) -> &str {
        &self.access
    }

    /// The refresh token.
    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// Whether both halves are usable.  Pairs deserialized from the wire may be empty.
    pub fn is_usable(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}
