//! Error types for the crumb-aware security client.
//!
//! # Design
//! Failures fall into two caller-facing families. `ConfigurationError` covers
//! setup problems (missing crumb file, bad URL, transport failures) and should
//! be reported as a bug in the environment. `AuthenticationError` means the
//! server rejected the request for an identifiable reason, so the caller can
//! prompt for new credentials. `CrumbUnreadable` is kept apart from both: a
//! crumb file that exists but cannot be read is an environment fault that
//! normal error handling is not expected to recover from.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Top-level error returned by `SecurityClient` operations.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The crumb file exists but could not be read.
    #[error("unable to read '{}'", path.display())]
    CrumbUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only produced under `UnclassifiedPolicy::Strict`.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },
}

impl SecurityError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, SecurityError::Authentication(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SecurityError::Configuration(_))
    }
}

/// Environment or setup problems. Never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("crumb file '{}' not found", path.display())]
    CrumbFileNotFound { path: PathBuf },

    #[error("invalid url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A 3xx response arrived without a usable `Location` header.
    #[error("redirect from {url} has no Location header")]
    MissingLocation { url: String },

    #[error("error during method execution {url}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid client configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Reasons a server rejected a request.
///
/// The `Display` strings are part of the contract with callers and are kept
/// stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("Not found")]
    NotFound,

    #[error("CSRF enabled -> Missing or bad crumb data")]
    BadCrumb,

    #[error("Unauthorized -> Missing or bad credentials")]
    BadCredentials,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Server Internal Error: Server unavailable")]
    ServerUnavailable,
}

/// Low-level failure reported by a `Transport` (connect, TLS, malformed HTTP,
/// I/O while reading the body).
#[derive(Debug)]
pub struct TransportError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl TransportError {
    pub fn new(cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(cause.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        Self(Box::new(e))
    }
}
