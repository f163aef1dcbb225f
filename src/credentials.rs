//! Credential storage.
//!
//! A [`CredentialStore`] holds the current [`CredentialPair`].  Two backings exist because the
//! auth service supports two trust models:
//!
//! - [`TokenStore`] keeps client-held tokens that the transport attaches as a bearer header.
//! - [`CookieJarStore`] is the HTTP client's cookie jar.  The auth service sets http-only
//!   cookies on login and refresh, and the transport sends them back ambiently.
//!
//! Stores never perform network I/O.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::cookie::{CookieStore as HttpCookieStore, Jar};
use reqwest::header::HeaderValue;
use url::Url;

use crate::config::{ClientConfig, CredentialMode};
use crate::types::CredentialPair;

/// Storage for the current credential pair.
pub trait CredentialStore: Send + Sync {
    /// The current pair, or `None` if there is no usable pair.
    fn get(&self) -> Option<CredentialPair>;

    /// Replace the current pair.
    fn set(&self, pair: CredentialPair);

    /// Forget all credentials.
    fn clear(&self);
}

/// Client-held tokens kept in memory.
#[derive(Debug, Default)]
pub struct TokenStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl TokenStore {
    /// Create a store, optionally seeded with a pair.
    pub fn new(pair: Option<CredentialPair>) -> Self {
        Self {
            pair: RwLock::new(pair.filter(CredentialPair::is_usable)),
        }
    }
}

impl CredentialStore for TokenStore {
    fn get(&self) -> Option<CredentialPair> {
        self.pair.read().clone()
    }

    fn set(&self, pair: CredentialPair) {
        *self.pair.write() = Some(pair).filter(CredentialPair::is_usable);
    }

    fn clear(&self) {
        *self.pair.write() = None;
    }
}

/// A cookie jar that doubles as the credential store in cookie mode.
///
/// Install it as the HTTP client's cookie provider; `Set-Cookie` headers from either service
/// land here and matching cookies are sent with every request.  The credential view reads the
/// access and refresh cookies as seen by the auth service URL.
pub struct CookieJarStore {
    jar: RwLock<Jar>,
    scope: Url,
    access_cookie: String,
    refresh_cookie: String,
}

impl CookieJarStore {
    /// Create an empty jar whose credential view is scoped to `scope`.
    pub fn new(
        scope: Url,
        access_cookie: impl Into<String>,
        refresh_cookie: impl Into<String>,
    ) -> Self {
        Self {
            jar: RwLock::new(Jar::default()),
            scope,
            access_cookie: access_cookie.into(),
            refresh_cookie: refresh_cookie.into(),
        }
    }

    /// Create a jar for the auth service and cookie names in `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.auth_base_url.clone(),
            &config.access_cookie,
            &config.refresh_cookie,
        )
    }

    fn cookie_value(header: &str, name: &str) -> Option<String> {
        header
            .split(';')
            .filter_map(|kv| kv.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

impl CredentialStore for CookieJarStore {
    fn get(&self) -> Option<CredentialPair> {
        let header = self.jar.read().cookies(&self.scope)?;
        let header = header.to_str().ok()?;
        CredentialPair::from_parts(
            Self::cookie_value(header, &self.access_cookie),
            Self::cookie_value(header, &self.refresh_cookie),
        )
    }

    fn set(&self, pair: CredentialPair) {
        let jar = self.jar.read();
        jar.add_cookie_str(
            &format!("{}={}; Path=/", self.access_cookie, pair.access()),
            &self.scope,
        );
        jar.add_cookie_str(
            &format!("{}={}; Path=/", self.refresh_cookie, pair.refresh()),
            &self.scope,
        );
    }

    fn clear(&self) {
        *self.jar.write() = Jar::default();
    }
}

impl HttpCookieStore for CookieJarStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar.read().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.read().cookies(url)
    }
}

impl std::fmt::Debug for CookieJarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJarStore")
            .field("scope", &self.scope.as_str())
            .field("access_cookie", &self.access_cookie)
            .field("refresh_cookie", &self.refresh_cookie)
            .finish()
    }
}

/// The credential backing handed to the transport.
#[derive(Clone)]
pub enum CredentialBacking {
    /// Client-held tokens, attached as `Authorization: Bearer`.
    Tokens(Arc<dyn CredentialStore>),
    /// Transport-managed cookies, sent ambiently.
    Cookies(Arc<CookieJarStore>),
}

impl CredentialBacking {
    /// Build the backing selected by `config.credential_mode`, seeded with
    /// `config.credentials`.
    pub fn from_config(config: &ClientConfig) -> Self {
        match config.credential_mode {
            CredentialMode::Bearer => {
                CredentialBacking::Tokens(Arc::new(TokenStore::new(config.credentials.clone())))
            }
            CredentialMode::Cookie => {
                let jar = CookieJarStore::from_config(config);
                if let Some(pair) = config.credentials.clone() {
                    jar.set(pair);
                }
                CredentialBacking::Cookies(Arc::new(jar))
            }
        }
    }

    /// The credential mode this backing implements.
    pub fn mode(&self) -> CredentialMode {
        match self {
            CredentialBacking::Tokens(_) => CredentialMode::Bearer,
            CredentialBacking::Cookies(_) => CredentialMode::Cookie,
        }
    }

    /// The backing viewed as a credential store.
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        match self {
            CredentialBacking::Tokens(store) => Arc::clone(store),
            CredentialBacking::Cookies(jar) => Arc::clone(jar) as Arc<dyn CredentialStore>,
        }
    }
}
