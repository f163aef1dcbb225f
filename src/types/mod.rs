// Public modules
pub mod chat_session;
pub mod credential_pair;
pub mod message;
pub mod refresh_param;
pub mod send_message_param;
pub mod session_title_param;
pub mod user_info;

// Re-exports
pub use chat_session::{ChatSession, default_session};
pub use credential_pair::CredentialPair;
pub use message::{Message, MessageRole};
pub use refresh_param::RefreshParam;
pub use send_message_param::SendMessageParam;
pub use session_title_param::{DEFAULT_SESSION_TITLE, SessionTitleParam};
pub use user_info::UserInfo;
