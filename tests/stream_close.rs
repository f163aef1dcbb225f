//! Integration tests: a reply stream whose connection goes away mid-frame.
//!
//! These use a raw socket rather than the axum fake so the server can end the response
//! without the terminating chunk.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use chatwire::{
    ChatClient, ClientConfig, CredentialMode, CredentialPair, Error, StreamOutcome, TokenSink,
};

const BODY: &str = "data: Hello\n\ndata:  there\n\ndata: part";

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

#[derive(Debug, Clone, Copy)]
enum Ending {
    Reset,
    Close,
}

/// Read one request, headers and body, so closing the socket does not discard unread input.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client went away before sending a request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client went away mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Serve one chunked event stream that stops mid-frame and then ends the connection.
async fn serve_truncated(ending: Ending) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{BODY}\r\n",
            BODY.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Ending::Reset = ending {
            #[allow(deprecated)]
            stream.set_linger(Some(Duration::ZERO)).unwrap();
        }
        drop(stream);
    });
    format!("http://{addr}")
}

async fn stream_until(ending: Ending) -> (StreamOutcome, RecordingSink) {
    let url = serve_truncated(ending).await;
    let config = ClientConfig::new()
        .with_api_base_url(&url)
        .unwrap()
        .with_credential_mode(CredentialMode::Bearer)
        .with_credentials(CredentialPair::new("a", "r"));
    let client = ChatClient::new(&config).unwrap();

    let mut sink = RecordingSink::default();
    let outcome = client
        .send_message_streaming("s1", "hi", &mut sink, &CancellationToken::new())
        .await;
    (outcome, sink)
}

#[tokio::test]
async fn reset_after_tokens_completes_stream() {
    let (outcome, sink) = stream_until(Ending::Reset).await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(sink.tokens, vec!["Hello".to_string(), " there".to_string()]);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(sink.completions, 1);
}

#[tokio::test]
async fn close_without_last_chunk_completes_stream() {
    let (outcome, sink) = stream_until(Ending::Close).await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(sink.tokens, vec!["Hello".to_string(), " there".to_string()]);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(sink.completions, 1);
}
