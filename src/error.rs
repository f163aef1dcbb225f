//! Error types for the chatwire client.
//!
//! Every failure the client can report is a variant of [`Error`].  The transport resolves
//! expired credentials locally and the stream reader resolves benign connection teardown
//! locally, so what reaches callers is either a network failure, a pass-through HTTP status,
//! an exhausted authentication attempt, or a broken stream.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for the chatwire client.
#[derive(Clone, Debug)]
pub enum Error {
    /// The request never completed.
    Network {
        /// The client operation that failed, when known.
        operation: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The backend answered with a non-success status that the transport does not retry.
    Http {
        /// The client operation that failed, e.g. `list_sessions`.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or the raw body.
        message: String,
        /// Trace id reported by the backend for support and log correlation.
        trace_id: Option<String>,
    },

    /// Credentials could not be established, even after one refresh.
    ///
    /// Local credential state has been cleared by the time this is returned; the caller
    /// is expected to send the user through the login flow.
    AuthenticationFailed {
        /// Human-readable error message.
        message: String,
    },

    /// The streaming body was malformed or could not be read.
    StreamProtocol {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// The client operation that failed, when known.
        operation: Option<String>,
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// The client was configured with values it cannot use.
    Configuration {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new network error.
    pub fn network(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Network {
            operation: None,
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new HTTP status error for the named operation.
    pub fn http(
        operation: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        trace_id: Option<String>,
    ) -> Self {
        Error::Http {
            operation: operation.into(),
            status,
            message: message.into(),
            trace_id,
        }
    }

    /// Creates a new authentication failure.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Error::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates a new stream protocol error.
    pub fn stream_protocol(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::StreamProtocol {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            operation: None,
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Attributes a network or serialization error to the client operation that raised it.
    ///
    /// Other variants are returned unchanged; an HTTP error already names its operation.
    pub fn with_operation(mut self, name: &str) -> Self {
        match &mut self {
            Error::Network { operation, .. } | Error::Serialization { operation, .. } => {
                if operation.is_none() {
                    *operation = Some(name.to_string());
                }
            }
            _ => {}
        }
        self
    }

    /// Returns true if the request never completed.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Returns true if this is a pass-through HTTP status error.
    pub fn is_http(&self) -> bool {
        matches!(self, Error::Http { .. })
    }

    /// Returns true if the user must log in again.
    pub fn is_authentication_failed(&self) -> bool {
        matches!(self, Error::AuthenticationFailed { .. })
    }

    /// Returns true if the stream could not be read.
    pub fn is_stream_protocol(&self) -> bool {
        matches!(self, Error::StreamProtocol { .. })
    }

    /// Returns true if this is a serialization error.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization { .. })
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the backend trace id associated with this error, if any.
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Error::Http { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the client operation associated with this error, if any.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Error::Http { operation, .. } => Some(operation),
            Error::Network { operation, .. } | Error::Serialization { operation, .. } => {
                operation.as_deref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network { message, .. } => {
                write!(f, "Network error: {message}")
            }
            Error::Http {
                operation,
                status,
                message,
                trace_id,
            } => {
                if message.is_empty() {
                    write!(f, "{operation} failed with HTTP {status}")?;
                } else {
                    write!(f, "{operation} failed with HTTP {status}: {message}")?;
                }
                if let Some(trace_id) = trace_id {
                    write!(f, " (Trace ID: {trace_id})")?;
                }
                Ok(())
            }
            Error::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {message}")
            }
            Error::StreamProtocol { message, .. } => {
                write!(f, "Stream protocol error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Network { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::StreamProtocol { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::stream_protocol(format!("invalid UTF-8 in stream: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for chatwire operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn http_error_carries_operation_and_status() {
        let err = Error::http("list_sessions", 500, "boom", Some("t-1".to_string()));
        assert!(err.is_http());
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.operation(), Some("list_sessions"));
        assert_eq!(err.trace_id(), Some("t-1"));
        assert_eq!(
            err.to_string(),
            "list_sessions failed with HTTP 500: boom (Trace ID: t-1)"
        );
    }

    #[test]
    fn http_error_without_body() {
        let err = Error::http("delete_session", 404, "", None);
        assert_eq!(err.to_string(), "delete_session failed with HTTP 404");
    }

    #[test]
    fn io_error_exposes_source() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        let source = err.source().unwrap();
        let io = source.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn network_and_serialization_errors_name_their_operation() {
        let err = Error::network("Connection error: refused", None);
        assert_eq!(err.operation(), None);
        let err = err.with_operation("list_sessions");
        assert!(err.is_network());
        assert_eq!(err.operation(), Some("list_sessions"));
        assert_eq!(err.status(), None);

        // The innermost attribution wins.
        let err = err.with_operation("outer");
        assert_eq!(err.operation(), Some("list_sessions"));

        let err = Error::serialization("bad JSON", None).with_operation("get_history");
        assert_eq!(err.operation(), Some("get_history"));

        let err = Error::http("get_session", 404, "", None).with_operation("other");
        assert_eq!(err.operation(), Some("get_session"));

        let err = Error::authentication_failed("x").with_operation("user_info");
        assert_eq!(err.operation(), None);
    }

    #[test]
    fn predicates_are_exclusive() {
        let err = Error::authentication_failed("refresh rejected");
        assert!(err.is_authentication_failed());
        assert!(!err.is_network());
        assert!(!err.is_stream_protocol());
        assert_eq!(err.status(), None);
    }
}
