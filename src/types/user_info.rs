use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The authenticated user's profile, as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Primary e-mail address.
    pub email: String,

    /// Display name.
    pub user_name: String,

    /// Whether a second factor is enrolled.
    pub two_factor_enabled: bool,

    /// Whether a passkey is registered.
    pub passkey_enabled: bool,

    /// Whether the e-mail address has been verified.
    pub email_verified: bool,

    /// When the account was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn user_info_deserialization() {
        let info: UserInfo = serde_json::from_value(json!({
            "email": "ada@example.com",
            "userName": "ada",
            "twoFactorEnabled": true,
            "passkeyEnabled": false,
            "emailVerified": true,
            "createdAt": "2023-05-01T12:00:00Z",
        }))
        .unwrap();

        assert_eq!(info.email, "ada@example.com");
        assert_eq!(info.user_name, "ada");
        assert!(info.two_factor_enabled);
        assert!(!info.passkey_enabled);
        assert!(info.email_verified);
        assert_eq!(info.created_at, datetime!(2023-05-01 12:00:00 UTC));
    }
}
