//! An in-process fake of the chat backend and the auth service.
//!
//! Both services are served by one axum router on a free port.  The backend accepts exactly
//! one access token at a time; the refresh endpoint rotates it.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};

use chatwire::{ClientConfig, CredentialMode, CredentialPair};

pub const ACCESS: &str = "a0";
pub const REFRESH: &str = "r0";

/// Shared state of the fake services.
pub struct FakeState {
    access: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay: Mutex<Duration>,
    pub refresh_fails: AtomicBool,
    pub reject_always: AtomicBool,
    pub authorization: Mutex<Vec<Option<String>>>,
    pub cookies: Mutex<Vec<Option<String>>>,
    pub traceparents: Mutex<Vec<String>>,
    pub bodies: Mutex<Vec<Value>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            access: Mutex::new(ACCESS.to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_delay: Mutex::new(Duration::ZERO),
            refresh_fails: AtomicBool::new(false),
            reject_always: AtomicBool::new(false),
            authorization: Mutex::new(Vec::new()),
            cookies: Mutex::new(Vec::new()),
            traceparents: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
        }
    }
}

impl FakeState {
    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn access(&self) -> String {
        self.access.lock().clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let value = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let authorization = value(header::AUTHORIZATION);
        let cookie = value(header::COOKIE);
        self.authorization.lock().push(authorization.clone());
        self.cookies.lock().push(cookie.clone());
        if let Some(tp) = value(header::HeaderName::from_static("traceparent")) {
            self.traceparents.lock().push(tp);
        }

        if self.reject_always.load(Ordering::SeqCst) {
            return false;
        }
        let access = self.access();
        let bearer = authorization.as_deref() == Some(format!("Bearer {access}").as_str());
        let cookie = cookie.is_some_and(|c| {
            c.split(';')
                .any(|kv| kv.trim() == format!("access_token={access}"))
        });
        bearer || cookie
    }
}

/// A running fake and its base URL.
pub struct Fake {
    pub state: Arc<FakeState>,
    pub url: String,
}

impl Fake {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind free port");
        let addr = listener.local_addr().expect("local_addr");
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            state,
            url: format!("http://{addr}"),
        }
    }

    /// A config pointing both services at this fake.
    pub fn config(&self, mode: CredentialMode, access: &str) -> ClientConfig {
        ClientConfig::new()
            .with_api_base_url(&self.url)
            .expect("api url")
            .with_auth_base_url(&self.url)
            .expect("auth url")
            .with_credential_mode(mode)
            .with_credentials(CredentialPair::new(access, REFRESH))
    }
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/v1/sessions/:id",
            get(get_session).put(rename_session).delete(delete_session),
        )
        .route("/api/v1/sessions/:id/history", get(history))
        .route("/api/v1/sessions/:id/messages", post(send_message))
        .route("/api/v1/sessions/:id/messages/stream", post(stream_message))
        .route("/api/auth/v1/refresh", post(refresh))
        .route("/api/auth/v1/user", get(user))
        .route("/api/auth/v1/logout", post(logout))
        .with_state(state)
}

fn session(id: &str, title: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": updated_at,
    })
}

fn unauthorized() -> Response {
    StatusCode::UNAUTHORIZED.into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "timestamp": "2024-01-01T00:00:00",
            "status": 404,
            "code": "NOT_FOUND",
            "message": "Session not found",
            "traceId": "trace-404",
        })),
    )
        .into_response()
}

async fn list_sessions(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([
        session("b", "Second", "2024-01-02T00:00:00Z"),
        session("a", "First", "2024-01-01T00:00:00Z"),
    ]))
    .into_response()
}

async fn create_session(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.bodies.lock().push(body.clone());
    let title = body["title"].as_str().unwrap_or_default();
    Json(session("s-new", title, "2024-01-03T00:00:00Z")).into_response()
}

async fn get_session(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return not_found();
    }
    Json(session(&id, "Fetched", "2024-01-02T00:00:00Z")).into_response()
}

async fn rename_session(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or_default();
    Json(session(&id, title, "2024-01-04T00:00:00Z")).into_response()
}

async fn delete_session(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn history(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id == "garbled" {
        return ([(header::CONTENT_TYPE, "application/json")], "[{\"id\":").into_response();
    }
    Json(json!([
        {"id": format!("{id}-1"), "content": "Hi", "role": "user", "timestamp": "2024-01-02T10:00:00"},
        {"id": format!("{id}-2"), "content": "Hello!", "role": "assistant", "timestamp": "2024-01-02T10:00:01"},
    ]))
    .into_response()
}

async fn send_message(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let reply = format!("echo: {}", body["message"].as_str().unwrap_or_default());
    state.bodies.lock().push(body);
    Json(json!({
        "id": "m-reply",
        "content": reply,
        "role": "assistant",
        "timestamp": "2024-01-02T10:00:02Z",
    }))
    .into_response()
}

async fn stream_message(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return not_found();
    }
    state.bodies.lock().push(body);
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    if accept != Some("text/event-stream") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        "data: Hello\n\ndata: \n\ndata:  there\n\n",
    )
        .into_response()
}

async fn refresh(State(state): State<Arc<FakeState>>, body: Bytes) -> Response {
    let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let delay = *state.refresh_delay.lock();
    tokio::time::sleep(delay).await;
    if state.refresh_fails.load(Ordering::SeqCst) {
        return unauthorized();
    }

    let access = format!("a{n}");
    let refresh = format!("r{n}");
    *state.access.lock() = access.clone();

    if body.is_empty() {
        (
            AppendHeaders([
                (header::SET_COOKIE, format!("access_token={access}; Path=/; HttpOnly")),
                (header::SET_COOKIE, format!("refresh_token={refresh}; Path=/; HttpOnly")),
            ]),
            StatusCode::OK,
        )
            .into_response()
    } else {
        let param: Value = serde_json::from_slice(&body).unwrap_or_default();
        if param["refreshToken"].as_str().is_none_or(str::is_empty) {
            return StatusCode::BAD_REQUEST.into_response();
        }
        Json(json!({"accessToken": access, "refreshToken": refresh})).into_response()
    }
}

async fn user(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "email": "ada@example.com",
        "userName": "ada",
        "twoFactorEnabled": false,
        "passkeyEnabled": true,
        "emailVerified": true,
        "createdAt": "2023-12-01T00:00:00Z",
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    StatusCode::OK.into_response()
}
