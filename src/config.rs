//! Client configuration.
//!
//! [`ClientConfig`] holds everything the client needs to reach the chat backend and the auth
//! service.  It can be built with `with_*` methods, read from `CHATWIRE_*` environment
//! variables, or produced from the `chatwire-chat` command line via [`ChatArgs`].

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use arrrg_derive::CommandLine;
use url::Url;

use crate::error::{Error, Result};
use crate::types::CredentialPair;

/// Default chat backend location.
pub const DEFAULT_API_URL: &str = "http://localhost:7075";

/// Default auth service location.
pub const DEFAULT_AUTH_URL: &str = "http://localhost:7080";

/// Default timeout for non-streaming requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connect timeout, which also bounds streaming requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default name of the access-token cookie set by the auth service.
pub const DEFAULT_ACCESS_COOKIE: &str = "access_token";

/// Default name of the refresh-token cookie set by the auth service.
pub const DEFAULT_REFRESH_COOKIE: &str = "refresh_token";

/// How credentials travel with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Server-set cookies kept in the transport's cookie jar and sent ambiently.
    #[default]
    Cookie,
    /// Client-held tokens attached as `Authorization: Bearer <access>`.
    Bearer,
}

impl FromStr for CredentialMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" | "cookies" => Ok(CredentialMode::Cookie),
            "bearer" | "token" => Ok(CredentialMode::Bearer),
            other => Err(Error::configuration(format!(
                "unknown credential mode {other:?} (expected \"cookie\" or \"bearer\")"
            ))),
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialMode::Cookie => write!(f, "cookie"),
            CredentialMode::Bearer => write!(f, "bearer"),
        }
    }
}

/// Configuration for a [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat backend.
    pub api_base_url: Url,

    /// Base URL of the auth service.
    pub auth_base_url: Url,

    /// How credentials are stored and attached.
    pub credential_mode: CredentialMode,

    /// Cookie carrying the access token in cookie mode.
    pub access_cookie: String,

    /// Cookie carrying the refresh token in cookie mode.
    pub refresh_cookie: String,

    /// Initial credentials, typically from a previous login.
    pub credentials: Option<CredentialPair>,

    /// Timeout for non-streaming requests.
    pub timeout: Duration,

    /// Connect timeout for every request.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration pointing at the default local services.
    pub fn new() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            auth_base_url: Url::parse(DEFAULT_AUTH_URL).expect("default auth URL is valid"),
            credential_mode: CredentialMode::default(),
            access_cookie: DEFAULT_ACCESS_COOKIE.to_string(),
            refresh_cookie: DEFAULT_REFRESH_COOKIE.to_string(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// Recognized variables: `CHATWIRE_API_URL`, `CHATWIRE_AUTH_URL`,
    /// `CHATWIRE_CREDENTIALS`, `CHATWIRE_ACCESS_TOKEN`, `CHATWIRE_REFRESH_TOKEN` and
    /// `CHATWIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();
        if let Some(url) = lookup("CHATWIRE_API_URL") {
            config = config.with_api_base_url(&url)?;
        }
        if let Some(url) = lookup("CHATWIRE_AUTH_URL") {
            config = config.with_auth_base_url(&url)?;
        }
        if let Some(mode) = lookup("CHATWIRE_CREDENTIALS") {
            config = config.with_credential_mode(mode.parse()?);
        }
        config.credentials = CredentialPair::from_parts(
            lookup("CHATWIRE_ACCESS_TOKEN"),
            lookup("CHATWIRE_REFRESH_TOKEN"),
        );
        if let Some(secs) = lookup("CHATWIRE_TIMEOUT_SECS") {
            config = config.with_timeout(parse_secs(&secs)?);
        }
        Ok(config)
    }

    /// Sets the chat backend base URL.
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self> {
        self.api_base_url = parse_base_url(url)?;
        Ok(self)
    }

    /// Sets the auth service base URL.
    pub fn with_auth_base_url(mut self, url: &str) -> Result<Self> {
        self.auth_base_url = parse_base_url(url)?;
        Ok(self)
    }

    /// Sets the credential mode.
    pub fn with_credential_mode(mut self, mode: CredentialMode) -> Self {
        self.credential_mode = mode;
        self
    }

    /// Sets the cookie names used in cookie mode.
    pub fn with_cookie_names(
        mut self,
        access_cookie: impl Into<String>,
        refresh_cookie: impl Into<String>,
    ) -> Self {
        self.access_cookie = access_cookie.into();
        self.refresh_cookie = refresh_cookie.into();
        self
    }

    /// Sets the initial credentials.
    pub fn with_credentials(mut self, credentials: Option<CredentialPair>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the timeout for non-streaming requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the chatwire-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Chat backend base URL.
    #[arrrg(optional, "Chat backend URL (default: http://localhost:7075)", "URL")]
    pub api_url: Option<String>,

    /// Auth service base URL.
    #[arrrg(optional, "Auth service URL (default: http://localhost:7080)", "URL")]
    pub auth_url: Option<String>,

    /// Credential mode.
    #[arrrg(optional, "Credential mode: cookie or bearer (default: cookie)", "MODE")]
    pub credentials: Option<String>,

    /// Access token for bearer mode.
    #[arrrg(optional, "Access token to start with", "TOKEN")]
    pub access_token: Option<String>,

    /// Refresh token for bearer mode.
    #[arrrg(optional, "Refresh token to start with", "TOKEN")]
    pub refresh_token: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Timeout for non-streaming requests (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Verbose logging.
    #[arrrg(flag, "Log transport activity to stderr")]
    pub verbose: bool,
}

impl TryFrom<ChatArgs> for ClientConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = args.api_url {
            config = config.with_api_base_url(&url)?;
        }
        if let Some(url) = args.auth_url {
            config = config.with_auth_base_url(&url)?;
        }
        if let Some(mode) = args.credentials {
            config = config.with_credential_mode(mode.parse()?);
        }
        if let Some(pair) = CredentialPair::from_parts(args.access_token, args.refresh_token) {
            config = config.with_credentials(Some(pair));
        }
        if let Some(secs) = args.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn parse_base_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::configuration(format!(
            "base URL must be http or https: {url}"
        )));
    }
    Ok(parsed)
}

fn parse_secs(secs: &str) -> Result<Duration> {
    secs.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::configuration(format!("invalid timeout {secs:?}: {e}")))
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::url(format!("cannot append a path to {base}"), None))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
