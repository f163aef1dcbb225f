//! A client for a session-based chat backend.
//!
//! [`ChatClient`] talks to the backend through an [`AuthenticatedTransport`], which attaches
//! credentials, refreshes them once on a 401 and retries.  Streamed replies arrive as a
//! [`TokenStream`] or through a [`TokenSink`], and [`Conversation`] keeps the client-side
//! view of sessions and messages.

// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod observability;
pub mod sse;
pub mod transport;
pub mod types;
pub mod utils;

// Re-exports
pub use client::ChatClient;
pub use config::{ChatArgs, ClientConfig, CredentialMode};
pub use conversation::{AssistantSink, Conversation};
pub use credentials::{CookieJarStore, CredentialBacking, CredentialStore, TokenStore};
pub use error::{Error, Result};
pub use gateway::AuthGateway;
pub use observability::register_biometrics;
pub use sse::{StreamOutcome, TokenSink, TokenStream};
pub use transport::{ApiRequest, AuthStatus, AuthenticatedTransport};
pub use types::*;
