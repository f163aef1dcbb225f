//! The authenticated transport.
//!
//! Every backend call goes through [`AuthenticatedTransport::request`].  It attaches the
//! current credential, and on a 401 it refreshes once and retries the request once.  If that
//! does not produce an accepted request the local credentials are cleared, subscribers are told
//! that the user must log in again, and [`Error::AuthenticationFailed`] is returned.  All other
//! statuses pass through untouched.
//!
//! Refreshes are single-flight: when several requests hit a 401 together, the first one
//! refreshes and the rest retry with its result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{ClientConfig, CredentialMode};
use crate::credentials::{CredentialBacking, CredentialStore};
use crate::error::{Error, Result};
use crate::gateway::{AuthGateway, is_unauthorized};
use crate::observability::{
    AUTH_LOGIN_REQUIRED, AUTH_REFRESH_FAILURES, AUTH_REFRESH_SHARED, AUTH_REFRESHES,
    TRANSPORT_NETWORK_FAILURES, TRANSPORT_REQUEST_DURATION, TRANSPORT_REQUESTS,
    TRANSPORT_RETRIES, TRANSPORT_UNAUTHORIZED,
};
use crate::types::CredentialPair;

const APPLICATION_JSON: &str = "application/json";
const TEXT_EVENT_STREAM: &str = "text/event-stream";
const TRACEPARENT: &str = "traceparent";

/// A request description that can be sent more than once.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
    streaming: bool,
    traceparent: String,
}

impl ApiRequest {
    /// A request with the given method and URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
            streaming: false,
            traceparent: new_traceparent(),
        }
    }

    /// A `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A `POST` request.
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// A `PUT` request.
    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    /// A `DELETE` request.
    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Ask for an event stream.  Streaming requests are exempt from the request timeout.
    pub fn event_stream(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The W3C `traceparent` sent with every attempt of this request.
    pub fn traceparent(&self) -> &str {
        &self.traceparent
    }
}

/// A fresh W3C trace context, so the backend can correlate its logs with ours.
fn new_traceparent() -> String {
    let trace_id = Uuid::new_v4().simple().to_string();
    let span_id = &Uuid::new_v4().simple().to_string()[..16];
    format!("00-{trace_id}-{span_id}-01")
}

/// Whether the user is still logged in, as far as the transport knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Requests are being accepted, or have not been rejected yet.
    Active,
    /// Credentials were rejected and could not be refreshed; the user must log in again.
    LoginRequired,
}

/// Classification of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthOutcome {
    Ok,
    Unauthorized,
}

#[derive(Debug)]
struct RefreshState {
    generation: u64,
    healthy: bool,
}

struct Inner {
    client: ReqwestClient,
    backing: CredentialBacking,
    store: Arc<dyn CredentialStore>,
    gateway: AuthGateway,
    timeout: Duration,
    // Mirrors `refresh.generation` so requests can note it without taking the lock.
    generation: AtomicU64,
    refresh: Mutex<RefreshState>,
    status: watch::Sender<AuthStatus>,
}

/// HTTP transport that attaches credentials and recovers from expired ones.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    inner: Arc<Inner>,
}

impl AuthenticatedTransport {
    /// Create a transport with the credential backing selected by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_backing(config, CredentialBacking::from_config(config))
    }

    /// Create a transport over an explicit credential backing.
    pub fn with_backing(config: &ClientConfig, backing: CredentialBacking) -> Result<Self> {
        let mut builder = ReqwestClient::builder().connect_timeout(config.connect_timeout);
        if let CredentialBacking::Cookies(jar) = &backing {
            builder = builder.cookie_provider(Arc::clone(jar));
        }
        let client = builder.build().map_err(|e| {
            Error::configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let gateway = AuthGateway::new(
            client.clone(),
            config.auth_base_url.clone(),
            backing.mode(),
        );
        let (status, _) = watch::channel(AuthStatus::Active);

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                store: backing.store(),
                backing,
                gateway,
                timeout: config.timeout,
                generation: AtomicU64::new(0),
                refresh: Mutex::new(RefreshState {
                    generation: 0,
                    healthy: true,
                }),
                status,
            }),
        })
    }

    /// The credential mode in use.
    pub fn mode(&self) -> CredentialMode {
        self.inner.backing.mode()
    }

    /// The credential store in use.
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.inner.store)
    }

    /// The auth service gateway.
    pub fn gateway(&self) -> &AuthGateway {
        &self.inner.gateway
    }

    /// Subscribe to authentication status changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.inner.status.subscribe()
    }

    /// The current authentication status.
    pub fn status(&self) -> AuthStatus {
        *self.inner.status.borrow()
    }

    /// Store freshly issued credentials, e.g. after an out-of-band login.
    pub fn set_credentials(&self, pair: CredentialPair) {
        self.inner.store.set(pair);
        self.inner.status.send_replace(AuthStatus::Active);
    }

    /// Forget local credentials and announce that a login is required.
    pub fn clear_credentials(&self) {
        self.inner.store.clear();
        self.inner.status.send_replace(AuthStatus::LoginRequired);
    }

    /// Send `request`, refreshing credentials and retrying once on a 401.
    pub async fn request(&self, request: ApiRequest) -> Result<Response> {
        let seen = self.inner.generation.load(Ordering::Acquire);
        let response = self.send_once(&request).await?;
        if classify(&response) == AuthOutcome::Ok {
            return Ok(response);
        }

        TRANSPORT_UNAUTHORIZED.click();
        debug!(
            method = %request.method,
            url = %request.url,
            traceparent = %request.traceparent,
            "got 401; refreshing credentials"
        );
        drop(response);
        self.refresh(seen).await?;

        TRANSPORT_RETRIES.click();
        debug!(method = %request.method, url = %request.url, "retrying after refresh");
        let retry = self.send_once(&request).await?;
        if classify(&retry) == AuthOutcome::Unauthorized {
            warn!(url = %request.url, "still unauthorized after refresh");
            return Err(self.login_required("credentials rejected after refresh"));
        }
        Ok(retry)
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<Response> {
        let accept = if request.streaming {
            TEXT_EVENT_STREAM
        } else {
            APPLICATION_JSON
        };
        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), request.url.clone())
            .header(header::ACCEPT, HeaderValue::from_static(accept))
            .header(TRACEPARENT, request.traceparent.as_str());
        if !request.streaming {
            builder = builder.timeout(self.inner.timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let CredentialBacking::Tokens(store) = &self.inner.backing {
            if let Some(pair) = store.get() {
                builder = builder.bearer_auth(pair.access());
            }
        }

        TRANSPORT_REQUESTS.click();
        let started = Instant::now();
        let result = builder.send().await;
        TRANSPORT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            TRANSPORT_NETWORK_FAILURES.click();
            warn!(method = %request.method, url = %request.url, error = %e, "request failed");
            if e.is_timeout() {
                Error::network(format!("Request timed out: {e}"), Some(Box::new(e)))
            } else if e.is_connect() {
                Error::network(format!("Connection error: {e}"), Some(Box::new(e)))
            } else {
                Error::network(format!("Request failed: {e}"), Some(Box::new(e)))
            }
        })?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status().as_u16(),
            "response received"
        );
        Ok(response)
    }

    /// Refresh credentials unless another request already did since `seen`.
    async fn refresh(&self, seen: u64) -> Result<()> {
        let mut state = self.inner.refresh.lock().await;
        if state.generation != seen {
            AUTH_REFRESH_SHARED.click();
            debug!(generation = state.generation, "reusing concurrent refresh");
            return if state.healthy {
                Ok(())
            } else {
                Err(Error::authentication_failed("credential refresh failed"))
            };
        }

        AUTH_REFRESHES.click();
        let current = self.inner.store.get();
        let result = self.inner.gateway.refresh(current.as_ref()).await;
        self.commit_refresh(&mut state, result)?;
        info!(generation = state.generation, "credentials refreshed");
        self.inner.status.send_replace(AuthStatus::Active);
        Ok(())
    }

    /// Record the outcome of a refresh under the refresh lock.
    ///
    /// The new pair must be visible before the new generation is: a request that notes the
    /// new generation has to send the new credential.
    fn commit_refresh(
        &self,
        state: &mut RefreshState,
        result: Result<Option<CredentialPair>>,
    ) -> Result<()> {
        let outcome = match result {
            Ok(fresh) => {
                if let Some(pair) = fresh {
                    self.inner.store.set(pair);
                }
                state.healthy = true;
                Ok(())
            }
            Err(err) => {
                AUTH_REFRESH_FAILURES.click();
                state.healthy = false;
                self.inner.store.clear();
                Err(err)
            }
        };
        state.generation += 1;
        self.inner.generation.store(state.generation, Ordering::Release);
        outcome.map_err(|err| self.login_required(&err.to_string()))
    }

    fn login_required(&self, reason: &str) -> Error {
        AUTH_LOGIN_REQUIRED.click();
        warn!(reason, "authentication exhausted; login required");
        self.clear_credentials();
        Error::authentication_failed(reason.to_string())
    }
}

impl std::fmt::Debug for AuthenticatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedTransport")
            .field("mode", &self.mode())
            .field("auth_base_url", &self.inner.gateway.base_url().as_str())
            .finish_non_exhaustive()
    }
}

fn classify(response: &Response) -> AuthOutcome {
    if is_unauthorized(response.status()) {
        AuthOutcome::Unauthorized
    } else {
        AuthOutcome::Ok
    }
}
