//! Client for the authentication service.
//!
//! The auth service is an external collaborator.  chatwire only consumes its refresh, user-info
//! and logout endpoints and knows where its login page lives; issuing credentials is entirely
//! the service's business.

use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::{CredentialMode, endpoint};
use crate::error::{Error, Result};
use crate::types::{CredentialPair, RefreshParam};

const AUTH_API: [&str; 3] = ["api", "auth", "v1"];

/// Endpoints of the authentication service.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    client: ReqwestClient,
    base_url: Url,
    mode: CredentialMode,
}

impl AuthGateway {
    /// Create a gateway that sends requests through `client`.
    ///
    /// In cookie mode `client` must share the transport's cookie jar so that rotated cookies
    /// land in the credential store.
    pub fn new(client: ReqwestClient, base_url: Url, mode: CredentialMode) -> Self {
        Self {
            client,
            base_url,
            mode,
        }
    }

    /// The auth service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn auth_endpoint(&self, name: &str) -> Result<Url> {
        let mut segments = AUTH_API.to_vec();
        segments.push(name);
        endpoint(&self.base_url, &segments)
    }

    /// `POST /api/auth/v1/refresh`.
    pub fn refresh_url(&self) -> Result<Url> {
        self.auth_endpoint("refresh")
    }

    /// `GET /api/auth/v1/user`.
    pub fn user_url(&self) -> Result<Url> {
        self.auth_endpoint("user")
    }

    /// `POST /api/auth/v1/logout`.
    pub fn logout_url(&self) -> Result<Url> {
        self.auth_endpoint("logout")
    }

    /// The human login page, returning to `callback` afterwards.
    pub fn login_url(&self, callback: &str) -> Result<Url> {
        let mut url = endpoint(&self.base_url, &["login"])?;
        url.query_pairs_mut().append_pair("callback", callback);
        Ok(url)
    }

    /// Ask the auth service for fresh credentials.
    ///
    /// In bearer mode the current refresh token is posted and the new pair is returned.  In
    /// cookie mode the refresh cookie travels ambiently, the service rotates cookies with
    /// `Set-Cookie`, and `Ok(None)` is returned on success.
    ///
    /// Any failure, including a network failure, is an [`Error::AuthenticationFailed`].
    pub async fn refresh(&self, current: Option<&CredentialPair>) -> Result<Option<CredentialPair>> {
        let url = self.refresh_url()?;
        let request = self
            .client
            .post(url)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"));
        let request = match self.mode {
            CredentialMode::Cookie => request,
            CredentialMode::Bearer => {
                let Some(current) = current else {
                    return Err(Error::authentication_failed(
                        "no refresh token available",
                    ));
                };
                request.json(&RefreshParam::new(current.refresh()))
            }
        };

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "credential refresh request failed");
            Error::authentication_failed(format!("refresh request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "credential refresh rejected");
            return Err(Error::authentication_failed(format!(
                "refresh rejected with HTTP {}",
                status.as_u16()
            )));
        }
        debug!(status = status.as_u16(), mode = %self.mode, "credential refresh accepted");

        match self.mode {
            CredentialMode::Cookie => Ok(None),
            CredentialMode::Bearer => {
                let pair = response.json::<CredentialPair>().await.map_err(|e| {
                    Error::authentication_failed(format!("unreadable refresh response: {e}"))
                })?;
                if !pair.is_usable() {
                    return Err(Error::authentication_failed(
                        "refresh response carried an incomplete credential pair",
                    ));
                }
                Ok(Some(pair))
            }
        }
    }
}

/// Whether a status means the credential was not accepted.
pub(crate) fn is_unauthorized(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}
