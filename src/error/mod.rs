//! Error types for fwq.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Fetch-path errors fall into five kinds, mirroring what the refresh
//! engine needs to distinguish:
//! - **CredentialMissing**: no API key resolvable; no network call is made
//! - **Transport**: DNS/TLS/connect/timeout failure, with diagnostic text
//! - **Http**: non-2xx status, with a truncated response body
//! - **AuthFailed**: HTTP 401 or a body containing "unauthorized";
//!   distinguished from `Http` because it drives the auth-method fallback
//! - **Parse**: malformed JSON or a missing/invalid required field
//!
//! All fetch-path errors are handled by the engine and converted into its
//! last-error string; none of them terminate the process.

use thiserror::Error;

/// Maximum response-body length carried inside an HTTP error message.
pub const HTTP_ERROR_BODY_CAP: usize = 200;

/// Exit codes for the fwq binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Credential missing or rejected by every auth method
    AuthError = 2,
    /// Parse/format errors
    ParseError = 3,
    /// Network failure
    NetworkError = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for fwq operations.
#[derive(Error, Debug)]
pub enum FwqError {
    /// No API key could be resolved from argument, environment, or key file.
    #[error(
        "API key not provided (set FIRMWARE_API_KEY, pass --api-key, or run `fwq key set`)"
    )]
    CredentialMissing,

    /// Low-level transport failure (DNS, TLS, connect, timeout).
    #[error("request failed: {detail}")]
    Transport { detail: String },

    /// Non-2xx HTTP response.
    #[error("HTTP error: {status}{}", format_body_suffix(.body))]
    Http { status: u16, body: String },

    /// Rejected by every authentication method.
    #[error("unauthorized after trying all auth methods (HTTP {status})")]
    AuthFailed { status: u16 },

    /// Malformed or incomplete quota payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Invalid configuration or argument combination.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem failure (key file, CSV log).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", crate::util::format::truncate_for_display(body, HTTP_ERROR_BODY_CAP))
    }
}

impl FwqError {
    /// Exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::CredentialMissing | Self::AuthFailed { .. } => ExitCode::AuthError,
            Self::Transport { .. } | Self::Http { .. } => ExitCode::NetworkError,
            Self::Parse { .. } => ExitCode::ParseError,
            Self::Config(_) | Self::Io(_) => ExitCode::GeneralError,
        }
    }

    /// Whether retrying on the next scheduled tick can plausibly succeed.
    ///
    /// Everything except a config mistake is retryable; the watch loop
    /// never stops on a fetch failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Result alias for fwq operations.
pub type Result<T> = std::result::Result<T, FwqError>;
