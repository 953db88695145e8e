//! HTTP client for the quota endpoint.
//!
//! Wraps reqwest so callers can distinguish "couldn't connect" (transport
//! error) from "server said no" (HTTP status): transport failures are
//! captured into the outcome instead of surfacing as `Err`.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::core::auth::{self, AuthMethod, AuthResolution};
use crate::error::{FwqError, Result};

/// Production quota endpoint.
pub const QUOTA_ENDPOINT: &str = "https://app.firmware.ai/api/v1/quota";

/// Default timeout for quota requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one HTTP attempt.
///
/// `transport_error` is set when the request never produced a response
/// (DNS, TLS, connect, timeout); `status`/`body` are set when it did.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: Option<u16>,
    pub body: String,
    pub transport_error: Option<String>,
}

impl FetchOutcome {
    /// An outcome with nothing in it (no attempt was made).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            status: None,
            body: String::new(),
            transport_error: None,
        }
    }

    /// Whether the HTTP status is in [200, 300).
    #[must_use]
    pub fn is_http_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Whether this response is an authentication rejection: HTTP 401,
    /// or a body containing "unauthorized" (case-insensitive).
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        if self.status == Some(401) {
            return true;
        }
        self.body.to_lowercase().contains("unauthorized")
    }

    /// Success predicate for the auth scan: transport succeeded, 2xx,
    /// and not an auth failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.transport_error.is_none() && self.is_http_success() && !self.is_auth_failure()
    }

    /// Convert a failed outcome into the matching error.
    ///
    /// Callers check `is_success()` first; a successful outcome maps to
    /// an `AuthFailed` with its own status only in the exhausted-scan
    /// case, where the last response reads as unauthorized.
    #[must_use]
    pub fn into_error(self) -> FwqError {
        if let Some(detail) = self.transport_error {
            return FwqError::Transport { detail };
        }
        let status = self.status.unwrap_or(0);
        if self.is_auth_failure() {
            return FwqError::AuthFailed { status };
        }
        FwqError::Http {
            status,
            body: self.body,
        }
    }
}

/// HTTP client bound to the quota endpoint.
#[derive(Debug, Clone)]
pub struct QuotaClient {
    client: Client,
    endpoint: String,
}

impl QuotaClient {
    /// Build a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns a transport error if client construction fails.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint(QUOTA_ENDPOINT, timeout)
    }

    /// Build a client against a custom endpoint (tests point this at a
    /// mock server).
    ///
    /// # Errors
    ///
    /// Returns a transport error if client construction fails.
    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(format!("fwq/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FwqError::Transport {
                detail: format!("client construction failed: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// The endpoint this client targets.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform one GET with the given auth method.
    pub async fn request(&self, method: AuthMethod, api_key: &str, token: &str) -> FetchOutcome {
        let (name, value) = method.header(api_key, token);

        let response = match self
            .client
            .get(&self.endpoint)
            .header(name, value)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return FetchOutcome {
                    status: None,
                    body: String::new(),
                    transport_error: Some(e.to_string()),
                };
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => FetchOutcome {
                status: Some(status),
                body,
                transport_error: None,
            },
            Err(e) => FetchOutcome {
                status: Some(status),
                body: String::new(),
                transport_error: Some(format!("failed to read response body: {e}")),
            },
        }
    }

    /// Fetch the quota payload, scanning auth methods as needed.
    ///
    /// `preferred` is the cached method from the last success; the
    /// resolution's `used_method` is the new value to cache.
    pub async fn fetch_with_auth(
        &self,
        api_key: &str,
        token: &str,
        preferred: Option<AuthMethod>,
    ) -> AuthResolution {
        auth::resolve_with(preferred, |method| self.request(method, api_key, token)).await
    }
}
