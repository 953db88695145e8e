//! Authentication method fallback.
//!
//! The quota endpoint has accepted several credential encodings over time,
//! so the fetcher tries them in a fixed priority order. The method that
//! last worked is cached by the engine and tried first on later fetches;
//! the full scan only runs again after an auth failure.

use serde::{Deserialize, Serialize};

use crate::core::http::FetchOutcome;

/// Prefix stripped from the API key to obtain the bare token.
pub const API_KEY_PREFIX: &str = "fw_api_";

/// Credential-encoding strategies, in fixed priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    /// `Authorization: Bearer <full key>`
    BearerFullKey,
    /// `Authorization: Bearer <key without fw_api_ prefix>`
    BearerToken,
    /// `X-API-Key: <full key>`
    XApiKey,
    /// `Authorization: <full key>` (no scheme)
    AuthorizationRaw,
}

impl AuthMethod {
    /// All methods in scan order.
    pub const ALL: &'static [Self] = &[
        Self::BearerFullKey,
        Self::BearerToken,
        Self::XApiKey,
        Self::AuthorizationRaw,
    ];

    /// Header name and value for this method.
    #[must_use]
    pub fn header(self, api_key: &str, token: &str) -> (&'static str, String) {
        match self {
            Self::BearerFullKey => ("Authorization", format!("Bearer {api_key}")),
            Self::BearerToken => ("Authorization", format!("Bearer {token}")),
            Self::XApiKey => ("X-API-Key", api_key.to_string()),
            Self::AuthorizationRaw => ("Authorization", api_key.to_string()),
        }
    }

    /// Short label for logs and diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BearerFullKey => "bearer-full-key",
            Self::BearerToken => "bearer-token",
            Self::XApiKey => "x-api-key",
            Self::AuthorizationRaw => "authorization-raw",
        }
    }
}

/// Extract the bare token from an API key by stripping the `fw_api_`
/// prefix if present.
#[must_use]
pub fn extract_token(api_key: &str) -> &str {
    api_key.strip_prefix(API_KEY_PREFIX).unwrap_or(api_key)
}

/// Outcome of an auth-method scan.
#[derive(Debug)]
pub struct AuthResolution {
    /// The final request outcome (success, or the last failure seen).
    pub outcome: FetchOutcome,
    /// The method that succeeded, if any. The caller caches this as the
    /// new preferred method.
    pub used_method: Option<AuthMethod>,
}

/// Run the auth fallback scan over an attempt function.
///
/// The attempt function performs one request with the given method. The
/// scan tries `preferred` first when set; a non-auth failure there is
/// returned immediately so a server outage is not masked as an auth
/// problem. Auth failures fall through the remaining methods in fixed
/// order, stopping at the first success or first non-auth failure.
pub async fn resolve_with<F, Fut>(preferred: Option<AuthMethod>, mut attempt: F) -> AuthResolution
where
    F: FnMut(AuthMethod) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let mut last: Option<FetchOutcome> = None;

    if let Some(method) = preferred {
        let outcome = attempt(method).await;
        if outcome.is_success() {
            tracing::debug!(method = method.label(), "preferred auth method succeeded");
            return AuthResolution {
                outcome,
                used_method: Some(method),
            };
        }
        if !outcome.is_auth_failure() {
            // Network or server failure: do not spam the other methods.
            return AuthResolution {
                outcome,
                used_method: None,
            };
        }
        tracing::debug!(
            method = method.label(),
            "preferred auth method rejected, scanning"
        );
        last = Some(outcome);
    }

    for &method in AuthMethod::ALL {
        if preferred == Some(method) {
            continue;
        }

        let outcome = attempt(method).await;
        if outcome.is_success() {
            tracing::debug!(method = method.label(), "auth method accepted");
            return AuthResolution {
                outcome,
                used_method: Some(method),
            };
        }
        let stop = !outcome.is_auth_failure();
        last = Some(outcome);
        if stop {
            // Stop early if the failure is not auth-related.
            break;
        }
    }

    AuthResolution {
        // An empty preferred-less scan cannot happen: ALL is non-empty.
        outcome: last.unwrap_or_else(FetchOutcome::empty),
        used_method: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ok_outcome() -> FetchOutcome {
        FetchOutcome {
            status: Some(200),
            body: r#"{"used":0.5}"#.to_string(),
            transport_error: None,
        }
    }

    fn unauthorized_outcome() -> FetchOutcome {
        FetchOutcome {
            status: Some(401),
            body: "Unauthorized".to_string(),
            transport_error: None,
        }
    }

    fn server_error_outcome() -> FetchOutcome {
        FetchOutcome {
            status: Some(500),
            body: "boom".to_string(),
            transport_error: None,
        }
    }

    /// Records the order methods were attempted and scripts their outcomes.
    struct Script {
        attempts: Mutex<Vec<AuthMethod>>,
        respond: fn(AuthMethod) -> FetchOutcome,
    }

    impl Script {
        fn run(
            &self,
            method: AuthMethod,
        ) -> impl Future<Output = FetchOutcome> + use<> {
            self.attempts.lock().unwrap().push(method);
            let outcome = (self.respond)(method);
            async move { outcome }
        }
    }

    #[tokio::test]
    async fn extract_token_strips_prefix() {
        assert_eq!(extract_token("fw_api_abc123"), "abc123");
        assert_eq!(extract_token("plain-key"), "plain-key");
        assert_eq!(extract_token("fw_api_"), "");
    }

    #[test]
    fn header_construction() {
        let (name, value) = AuthMethod::BearerFullKey.header("fw_api_k", "k");
        assert_eq!((name, value.as_str()), ("Authorization", "Bearer fw_api_k"));

        let (name, value) = AuthMethod::BearerToken.header("fw_api_k", "k");
        assert_eq!((name, value.as_str()), ("Authorization", "Bearer k"));

        let (name, value) = AuthMethod::XApiKey.header("fw_api_k", "k");
        assert_eq!((name, value.as_str()), ("X-API-Key", "fw_api_k"));

        let (name, value) = AuthMethod::AuthorizationRaw.header("fw_api_k", "k");
        assert_eq!((name, value.as_str()), ("Authorization", "fw_api_k"));
    }

    #[tokio::test]
    async fn no_preference_scans_in_fixed_order() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |m| {
                if m == AuthMethod::AuthorizationRaw {
                    ok_outcome()
                } else {
                    unauthorized_outcome()
                }
            },
        };

        let res = resolve_with(None, |m| script.run(m)).await;

        assert_eq!(res.used_method, Some(AuthMethod::AuthorizationRaw));
        assert_eq!(
            *script.attempts.lock().unwrap(),
            vec![
                AuthMethod::BearerFullKey,
                AuthMethod::BearerToken,
                AuthMethod::XApiKey,
                AuthMethod::AuthorizationRaw,
            ]
        );
    }

    #[tokio::test]
    async fn preferred_success_short_circuits() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |_| ok_outcome(),
        };

        let res = resolve_with(Some(AuthMethod::XApiKey), |m| script.run(m)).await;

        assert_eq!(res.used_method, Some(AuthMethod::XApiKey));
        assert_eq!(*script.attempts.lock().unwrap(), vec![AuthMethod::XApiKey]);
    }

    #[tokio::test]
    async fn preferred_auth_failure_falls_through_skipping_preferred() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |m| {
                if m == AuthMethod::BearerToken {
                    ok_outcome()
                } else {
                    unauthorized_outcome()
                }
            },
        };

        let res = resolve_with(Some(AuthMethod::XApiKey), |m| script.run(m)).await;

        assert_eq!(res.used_method, Some(AuthMethod::BearerToken));
        // Preferred first, then the fixed order with preferred skipped.
        assert_eq!(
            *script.attempts.lock().unwrap(),
            vec![
                AuthMethod::XApiKey,
                AuthMethod::BearerFullKey,
                AuthMethod::BearerToken,
            ]
        );
    }

    #[tokio::test]
    async fn preferred_non_auth_failure_returns_immediately() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |_| server_error_outcome(),
        };

        let res = resolve_with(Some(AuthMethod::BearerFullKey), |m| script.run(m)).await;

        assert!(res.used_method.is_none());
        assert_eq!(res.outcome.status, Some(500));
        assert_eq!(
            *script.attempts.lock().unwrap(),
            vec![AuthMethod::BearerFullKey]
        );
    }

    #[tokio::test]
    async fn scan_stops_at_first_non_auth_failure() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |m| {
                if m == AuthMethod::BearerToken {
                    server_error_outcome()
                } else {
                    unauthorized_outcome()
                }
            },
        };

        let res = resolve_with(None, |m| script.run(m)).await;

        assert!(res.used_method.is_none());
        assert_eq!(res.outcome.status, Some(500));
        assert_eq!(
            *script.attempts.lock().unwrap(),
            vec![AuthMethod::BearerFullKey, AuthMethod::BearerToken]
        );
    }

    #[tokio::test]
    async fn all_methods_exhausted_returns_last_unauthorized() {
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |_| unauthorized_outcome(),
        };

        let res = resolve_with(None, |m| script.run(m)).await;

        assert!(res.used_method.is_none());
        assert_eq!(res.outcome.status, Some(401));
        assert_eq!(script.attempts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn success_with_unauthorized_body_is_auth_failure() {
        // A 200 whose body still says "unauthorized" counts as an auth
        // failure and keeps the scan going.
        let script = Script {
            attempts: Mutex::new(Vec::new()),
            respond: |m| {
                if m == AuthMethod::BearerFullKey {
                    FetchOutcome {
                        status: Some(200),
                        body: r#"{"error":"Unauthorized"}"#.to_string(),
                        transport_error: None,
                    }
                } else {
                    ok_outcome()
                }
            },
        };

        let res = resolve_with(None, |m| script.run(m)).await;
        assert_eq!(res.used_method, Some(AuthMethod::BearerToken));
    }
}
