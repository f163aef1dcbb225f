//! Integration tests: the session API, streaming replies and the auth helpers.

mod common;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use chatwire::{
    AssistantSink, ChatClient, ClientConfig, Conversation, CredentialMode, Error, MessageRole,
    StreamOutcome, TokenSink,
};
use common::{ACCESS, Fake};

#[derive(Debug, Default)]
struct RecordingSink {
    tokens: Vec<String>,
    completions: usize,
    errors: Vec<Error>,
}

impl TokenSink for RecordingSink {
    fn on_token(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }

    fn on_complete(&mut self) {
        self.completions += 1;
    }

    fn on_error(&mut self, error: &Error) {
        self.errors.push(error.clone());
    }
}

async fn bearer_client() -> (Fake, ChatClient) {
    let fake = Fake::start().await;
    let client = ChatClient::new(&fake.config(CredentialMode::Bearer, ACCESS)).unwrap();
    (fake, client)
}

#[tokio::test]
async fn session_lifecycle() {
    let (fake, client) = bearer_client().await;

    let created = client.create_session(None).await.unwrap();
    assert_eq!(created.title, "New Chat");
    let created = client.create_session(Some("Trip plans")).await.unwrap();
    assert_eq!(created.title, "Trip plans");
    assert_eq!(
        fake.state.bodies.lock().clone(),
        vec![json!({"title": "New Chat"}), json!({"title": "Trip plans"})]
    );

    let fetched = client.get_session("s-1").await.unwrap();
    assert_eq!(fetched.id, "s-1");

    let renamed = client.rename_session("s-1", "Renamed").await.unwrap();
    assert_eq!(renamed.title, "Renamed");

    client.delete_session("s-1").await.unwrap();
}

#[tokio::test]
async fn listing_feeds_default_selection() {
    let (_fake, client) = bearer_client().await;

    let mut conversation = Conversation::new();
    conversation.set_sessions(client.list_sessions().await.unwrap());
    assert_eq!(conversation.selected().unwrap().id, "b");

    let history = client.get_history("b").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[1].content, "Hello!");
}

#[tokio::test]
async fn backend_errors_carry_operation_and_trace_id() {
    let (_fake, client) = bearer_client().await;

    let err = client.get_session("missing").await.unwrap_err();
    assert!(err.is_http());
    assert_eq!(err.operation(), Some("get_session"));
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.trace_id(), Some("trace-404"));
    assert_eq!(
        err.to_string(),
        "get_session failed with HTTP 404: Session not found (Trace ID: trace-404)"
    );

    let err = client.delete_session("missing").await.unwrap_err();
    assert_eq!(err.operation(), Some("delete_session"));
}

#[tokio::test]
async fn undecodable_body_names_operation() {
    let (_fake, client) = bearer_client().await;

    let err = client.get_history("garbled").await.unwrap_err();
    assert!(err.is_serialization(), "{err}");
    assert_eq!(err.operation(), Some("get_history"));
}

#[tokio::test]
async fn send_message_returns_reply() {
    let (fake, client) = bearer_client().await;

    let reply = client.send_message("b", "ping").await.unwrap();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "echo: ping");
    assert_eq!(fake.state.bodies.lock().clone(), vec![json!({"message": "ping"})]);
}

#[tokio::test]
async fn stream_message_yields_tokens() {
    let (_fake, client) = bearer_client().await;

    let tokens = client
        .stream_message("b", "hi")
        .await
        .unwrap()
        .collect_tokens()
        .await
        .unwrap();
    assert_eq!(tokens, vec!["Hello".to_string(), " there".to_string()]);
}

#[tokio::test]
async fn streamed_reply_grows_assistant_message() {
    let fake = Fake::start().await;
    // The stream request itself goes through refresh-and-retry.
    let client = ChatClient::new(&fake.config(CredentialMode::Bearer, "stale")).unwrap();
    let mut conversation = Conversation::new();
    conversation.push_user_message("hi");

    let cancel = CancellationToken::new();
    let mut echoed = String::new();
    let (outcome, id) = {
        let mut sink = AssistantSink::begin(&mut conversation).with_echo(|s| echoed.push_str(s));
        let outcome = client
            .send_message_streaming("b", "hi", &mut sink, &cancel)
            .await;
        (outcome, sink.id().to_string())
    };

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(fake.state.refreshes(), 1);
    assert_eq!(echoed, "Hello there");
    let message = conversation.message(&id).unwrap();
    assert_eq!(message.content, "Hello there");
    assert_eq!(message.role, MessageRole::Assistant);
    assert!(!conversation.is_open(&id));
}

#[tokio::test]
async fn failed_stream_start_reports_error_without_tokens() {
    let (_fake, client) = bearer_client().await;

    let mut sink = RecordingSink::default();
    let outcome = client
        .send_message_streaming("missing", "hi", &mut sink, &CancellationToken::new())
        .await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert!(sink.tokens.is_empty());
    assert_eq!(sink.completions, 0);
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.errors[0].operation(), Some("stream_message"));
    assert_eq!(sink.errors[0].status(), Some(404));
}

#[tokio::test]
async fn user_info_and_logout() {
    let (_fake, client) = bearer_client().await;

    let user = client.user_info().await.unwrap();
    assert_eq!(user.user_name, "ada");
    assert!(user.passkey_enabled);

    client.logout().await.unwrap();
    assert!(client.transport().store().get().is_none());
}

#[tokio::test]
async fn logout_clears_credentials_even_when_it_fails() {
    let config = ClientConfig::new()
        .with_auth_base_url("http://127.0.0.1:9")
        .unwrap()
        .with_credential_mode(CredentialMode::Bearer)
        .with_credentials(chatwire::CredentialPair::new("a", "r"));
    let client = ChatClient::new(&config).unwrap();

    let err = client.logout().await.unwrap_err();
    assert!(err.is_network(), "{err}");
    assert_eq!(err.operation(), Some("logout"));
    assert!(client.transport().store().get().is_none());
}

#[tokio::test]
async fn login_url_points_at_auth_service() {
    let (fake, client) = bearer_client().await;
    let url = client.login_url("http://localhost:3000/chat").unwrap();
    assert_eq!(
        url.as_str(),
        format!(
            "{}/login?callback=http%3A%2F%2Flocalhost%3A3000%2Fchat",
            fake.url
        )
    );
}
