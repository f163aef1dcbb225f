//! Token streaming over Server-Sent-Events-style bodies.
//!
//! The streaming endpoint answers with an unbounded body of `data: <token>\n\n` frames.  This
//! module turns the raw byte stream into a [`TokenStream`]: a lazy, cancellable sequence of
//! tokens in wire order.
//!
//! - Frames are delimited by `"\n\n"`.  Chunk boundaries are irrelevant, including those that
//!   split the delimiter or a multi-byte character.
//! - A frame counts only if it starts with `"data: "`.  Exactly those six characters are
//!   stripped; any further whitespace belongs to the token.  Empty payloads are keep-alives.
//! - End of body is normal completion.  A trailing partial frame is discarded.
//! - A connection reset while reading is treated as completion, because some stacks report the
//!   peer's close after the final flush that way.  Other read faults become
//!   [`Error::StreamProtocol`].
//!
//! Dropping a [`TokenStream`] releases the connection.  [`consume`] drives a stream into a
//! [`TokenSink`] and honours a [`CancellationToken`].

use std::error;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::observability::{
    STREAM_BENIGN_CLOSES, STREAM_CANCELLED, STREAM_DISCARDED_PARTIALS, STREAM_DURATION,
    STREAM_ERRORS, STREAM_FRAMES, STREAM_KEEPALIVES, STREAM_TOKENS,
};

/// Frame delimiter.
const DELIMITER: &[u8] = b"\n\n";

/// Prefix that marks a frame as carrying a token.
const DATA_PREFIX: &str = "data: ";

/// Messages some HTTP stacks attach to a close that raced the final read.
const CLOSE_RACE_MARKERS: &[&str] = &[
    "connection closed before message completed",
    "connection reset",
    "unexpected eof",
];

///////////////////////////////////////// Framing /////////////////////////////////////////

/// Splits a byte stream into `"\n\n"`-delimited frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    // Bytes already searched without finding a delimiter.
    scanned: usize,
}

impl Decoder for FrameDecoder {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        // Back up one byte so a delimiter split across reads is still found.
        let start = self.scanned.saturating_sub(DELIMITER.len() - 1);
        let Some(offset) = buf[start..]
            .windows(DELIMITER.len())
            .position(|window| window == DELIMITER)
        else {
            self.scanned = buf.len();
            return Ok(None);
        };

        let frame = buf.split_to(start + offset);
        buf.advance(DELIMITER.len());
        self.scanned = 0;
        STREAM_FRAMES.click();

        let frame = std::str::from_utf8(&frame)?;
        Ok(Some(frame.to_string()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            trace!(bytes = buf.len(), "discarding partial frame at end of stream");
            STREAM_DISCARDED_PARTIALS.click();
            buf.clear();
        }
        self.scanned = 0;
        Ok(None)
    }
}

/// The token carried by a frame, if any.
///
/// Returns `None` for frames without the `data: ` prefix and for keep-alives.
pub fn frame_token(frame: &str) -> Option<&str> {
    frame
        .strip_prefix(DATA_PREFIX)
        .filter(|payload| !payload.is_empty())
}

///////////////////////////////////////// Faults /////////////////////////////////////////

/// Whether a read fault is the peer closing the connection rather than a real failure.
pub fn is_benign_close(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

fn fault_kind(err: &(dyn error::Error + 'static)) -> io::ErrorKind {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            return io.kind();
        }
        let text = err.to_string().to_ascii_lowercase();
        if CLOSE_RACE_MARKERS.iter().any(|marker| text.contains(marker)) {
            return io::ErrorKind::UnexpectedEof;
        }
        current = err.source();
    }
    io::ErrorKind::Other
}

/// Convert a body read error into an `io::Error` whose kind reflects the root cause.
fn into_io_error<E>(err: E) -> io::Error
where
    E: Into<Box<dyn error::Error + Send + Sync>>,
{
    let boxed = err.into();
    let boxed = match boxed.downcast::<io::Error>() {
        Ok(io) => return *io,
        Err(other) => other,
    };
    let kind = fault_kind(&*boxed);
    io::Error::new(kind, boxed)
}

///////////////////////////////////////// Tokens /////////////////////////////////////////

type BoxTokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A lazy sequence of tokens read from a streaming response body.
///
/// Yields each token in wire order, then ends.  A read fault that is not a benign close is
/// yielded once as an error, after which the stream ends.  Dropping the stream closes the
/// underlying connection.
///
/// # Example
///
/// ```
/// # use bytes::Bytes;
/// # use chatwire::TokenStream;
/// # tokio_test::block_on(async {
/// let body = futures::stream::iter(vec![
///     Ok::<_, std::io::Error>(Bytes::from_static(b"data: Hello\n\nda")),
///     Ok(Bytes::from_static(b"ta:  there\n\n")),
/// ]);
/// let tokens = TokenStream::new(body).collect_tokens().await.unwrap();
/// assert_eq!(tokens, vec!["Hello", " there"]);
/// # });
/// ```
pub struct TokenStream {
    inner: BoxTokenStream,
}

impl TokenStream {
    /// Wrap a body byte stream, such as `reqwest::Response::bytes_stream()`.
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<Box<dyn error::Error + Send + Sync>> + 'static,
    {
        let reader = StreamReader::new(byte_stream.map(|chunk| chunk.map_err(into_io_error)));
        let frames = Box::pin(FramedRead::new(reader, FrameDecoder::default()));

        let inner = stream::unfold(Some(frames), |state| async move {
            let mut frames = state?;
            loop {
                match frames.next().await {
                    Some(Ok(frame)) => match frame_token(&frame) {
                        Some(token) => {
                            STREAM_TOKENS.click();
                            return Some((Ok(token.to_string()), Some(frames)));
                        }
                        None => {
                            STREAM_KEEPALIVES.click();
                            trace!(len = frame.len(), "skipping frame without token");
                        }
                    },
                    Some(Err(Error::Io { source, .. })) if is_benign_close(&source) => {
                        debug!(error = %source, "stream closed by peer; treating as complete");
                        STREAM_BENIGN_CLOSES.click();
                        return None;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "stream read failed");
                        STREAM_ERRORS.click();
                        return Some((Err(into_stream_error(err)), None));
                    }
                    None => return None,
                }
            }
        });

        Self {
            inner: Box::pin(inner),
        }
    }

    /// Collect every token, failing on the first stream error.
    pub async fn collect_tokens(mut self) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next().await {
            tokens.push(token?);
        }
        Ok(tokens)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream").finish_non_exhaustive()
    }
}

fn into_stream_error(err: Error) -> Error {
    match err {
        Error::Io { source, .. } => {
            Error::stream_protocol(format!("read failed: {source}"), Some(Box::new(source)))
        }
        err @ Error::StreamProtocol { .. } => err,
        other => Error::stream_protocol(other.to_string(), Some(Box::new(other))),
    }
}

///////////////////////////////////////// Callbacks /////////////////////////////////////////

/// Receives the tokens of one streamed response.
///
/// Exactly one of `on_complete` or `on_error` is called per stream, unless the stream is
/// cancelled, in which case neither is.
pub trait TokenSink {
    /// A token arrived.
    fn on_token(&mut self, token: &str);

    /// The stream ended normally.
    fn on_complete(&mut self);

    /// The stream, or the request that should have started it, failed.
    fn on_error(&mut self, error: &Error);
}

/// How a call to [`consume`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `on_complete` was called.
    Completed,
    /// `on_error` was called.
    Failed,
    /// Consumption was cancelled; no terminal callback was made.
    Cancelled,
}

/// Drive `tokens` into `sink` until the stream ends or `cancel` fires.
///
/// On cancellation the stream is dropped immediately, closing the connection, and the sink
/// receives no further calls.
pub async fn consume(
    mut tokens: TokenStream,
    sink: &mut dyn TokenSink,
    cancel: &CancellationToken,
) -> StreamOutcome {
    let started = Instant::now();
    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                STREAM_CANCELLED.click();
                break StreamOutcome::Cancelled;
            }
            next = tokens.next() => next,
        };
        match next {
            Some(Ok(token)) => sink.on_token(&token),
            Some(Err(err)) => {
                sink.on_error(&err);
                break StreamOutcome::Failed;
            }
            None => {
                sink.on_complete();
                break StreamOutcome::Completed;
            }
        }
    };
    drop(tokens);
    STREAM_DURATION.add(started.elapsed().as_secs_f64());
    outcome
}
