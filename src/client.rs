//! The chat session client.
//!
//! [`ChatClient`] names the backend's session, history and message endpoints and the auth
//! service's user and logout endpoints.  Every call goes through an [`AuthenticatedTransport`],
//! so an expired credential is refreshed transparently and only an unrecoverable one reaches
//! the caller as [`Error::AuthenticationFailed`].

use reqwest::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, endpoint};
use crate::error::{Error, Result};
use crate::sse::{StreamOutcome, TokenSink, TokenStream, consume};
use crate::transport::{ApiRequest, AuthenticatedTransport};
use crate::types::{ChatSession, Message, SendMessageParam, SessionTitleParam, UserInfo};

const CHAT_API: [&str; 2] = ["api", "v1"];

/// Client for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    transport: AuthenticatedTransport,
    api_base_url: Url,
}

impl ChatClient {
    /// Create a new client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = AuthenticatedTransport::new(config)?;
        Ok(Self::with_transport(transport, config.api_base_url.clone()))
    }

    /// Create a client that sends its requests through `transport`.
    pub fn with_transport(transport: AuthenticatedTransport, api_base_url: Url) -> Self {
        Self {
            transport,
            api_base_url,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    /// The backend base URL.
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    fn sessions_url(&self) -> Result<Url> {
        let mut segments = CHAT_API.to_vec();
        segments.push("sessions");
        endpoint(&self.api_base_url, &segments)
    }

    fn session_url(&self, id: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = CHAT_API.to_vec();
        segments.push("sessions");
        segments.push(id);
        segments.extend_from_slice(rest);
        endpoint(&self.api_base_url, &segments)
    }

    /// Turn a non-success response into an [`Error::Http`] for `operation`.
    ///
    /// The backend reports errors as `{"timestamp","status","code","message","traceId"}`.  A
    /// body that does not parse is carried verbatim as the message.
    async fn process_error_response(operation: &str, response: Response) -> Error {
        let status = response.status().as_u16();

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ErrorResponse {
            message: Option<String>,
            code: Option<String>,
            trace_id: Option<String>,
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::network(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                )
                .with_operation(operation);
            }
        };

        let (message, trace_id) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => {
                let message = match (parsed.message, parsed.code) {
                    (Some(message), _) => message,
                    (None, Some(code)) => code,
                    (None, None) => body.trim().to_string(),
                };
                (message, parsed.trace_id)
            }
            Err(_) => (body.trim().to_string(), None),
        };

        warn!(operation, status, trace_id = trace_id.as_deref(), "request rejected");
        Error::http(operation, status, message, trace_id)
    }

    /// Send `request`, failing with [`Error::Http`] on a non-success status.
    ///
    /// Network and decoding failures are attributed to `operation` as well.
    async fn execute(&self, operation: &str, request: ApiRequest) -> Result<Response> {
        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| e.with_operation(operation))?;
        if !response.status().is_success() {
            return Err(Self::process_error_response(operation, response).await);
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> Result<T> {
        let response = self.execute(operation, request).await?;
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse {operation} response: {e}"),
                Some(Box::new(e)),
            )
            .with_operation(operation)
        })
    }

    /// Create a session titled `title`, or "New Chat".
    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession> {
        let param = title.map(SessionTitleParam::new).unwrap_or_default();
        let request = ApiRequest::post(self.sessions_url()?).with_json(&param)?;
        self.execute_json("create_session", request).await
    }

    /// List the user's sessions in server order.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let request = ApiRequest::get(self.sessions_url()?);
        self.execute_json("list_sessions", request).await
    }

    /// Fetch one session.
    pub async fn get_session(&self, id: &str) -> Result<ChatSession> {
        let request = ApiRequest::get(self.session_url(id, &[])?);
        self.execute_json("get_session", request).await
    }

    /// Change a session's title.
    pub async fn rename_session(&self, id: &str, title: &str) -> Result<ChatSession> {
        let request =
            ApiRequest::put(self.session_url(id, &[])?).with_json(&SessionTitleParam::new(title))?;
        self.execute_json("rename_session", request).await
    }

    /// Delete a session.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let request = ApiRequest::delete(self.session_url(id, &[])?);
        self.execute("delete_session", request).await?;
        Ok(())
    }

    /// The messages of a session, oldest first.
    pub async fn get_history(&self, id: &str) -> Result<Vec<Message>> {
        let request = ApiRequest::get(self.session_url(id, &["history"])?);
        self.execute_json("get_history", request).await
    }

    /// Send a message and wait for the complete assistant reply.
    pub async fn send_message(&self, id: &str, content: &str) -> Result<Message> {
        let request = ApiRequest::post(self.session_url(id, &["messages"])?)
            .with_json(&SendMessageParam::new(content))?;
        self.execute_json("send_message", request).await
    }

    /// Send a message and stream the reply token by token.
    ///
    /// The returned stream owns the connection; dropping it abandons the reply.
    pub async fn stream_message(&self, id: &str, content: &str) -> Result<TokenStream> {
        let request = ApiRequest::post(self.session_url(id, &["messages", "stream"])?)
            .with_json(&SendMessageParam::new(content))?
            .event_stream();
        let response = self.execute("stream_message", request).await?;
        debug!(session = id, "reply stream opened");
        Ok(TokenStream::new(response.bytes_stream()))
    }

    /// Send a message and deliver the streamed reply to `sink`.
    ///
    /// A failure to start the stream is reported through `on_error`; no token is delivered
    /// in that case.
    pub async fn send_message_streaming(
        &self,
        id: &str,
        content: &str,
        sink: &mut dyn TokenSink,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            started = self.stream_message(id, content) => started,
        };
        match started {
            Ok(tokens) => consume(tokens, sink, cancel).await,
            Err(err) => {
                sink.on_error(&err);
                StreamOutcome::Failed
            }
        }
    }

    /// The logged-in user.
    pub async fn user_info(&self) -> Result<UserInfo> {
        let request = ApiRequest::get(self.transport.gateway().user_url()?);
        self.execute_json("user_info", request).await
    }

    /// End the session with the auth service.
    ///
    /// Local credentials are cleared whether or not the auth service accepted the call.
    pub async fn logout(&self) -> Result<()> {
        let result = match self.transport.gateway().logout_url() {
            Ok(url) => self.execute("logout", ApiRequest::post(url)).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.transport.clear_credentials();
        result
    }

    /// The login page URL, returning to `callback` after a successful login.
    pub fn login_url(&self, callback: &str) -> Result<Url> {
        self.transport.gateway().login_url(callback)
    }
}
