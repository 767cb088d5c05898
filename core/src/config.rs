//! Client configuration.
//!
//! Every field has a default, so `{}` is a valid JSON configuration and
//! describes a client with no crumb, one redirect hop, and the lenient
//! fall-through policy.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// What `execute` returns when the final response is neither 200, a
/// redirect, nor a classified failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedPolicy {
    /// Return the last collected body (or `Location` value), or an empty
    /// string if nothing was collected.
    #[default]
    LastCollected,
    /// Fail with `SecurityError::UnexpectedStatus`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// File holding the crumb. `None` or an empty path disables the crumb.
    pub crumb_file: Option<PathBuf>,
    /// Redirect hops followed per `execute` call.
    pub max_redirects: u32,
    pub unclassified: UnclassifiedPolicy,
    /// Whole-request timeout enforced by the transport, in milliseconds.
    /// `None` or `0` means no timeout.
    pub timeout_ms: Option<u64>,
    /// Largest response body the transport will read. `None` reads bodies
    /// of any size.
    pub max_body_bytes: Option<u64>,
    /// Read the crumb file while constructing the client instead of on
    /// first use.
    pub eager_crumb: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            crumb_file: None,
            max_redirects: 1,
            unclassified: UnclassifiedPolicy::LastCollected,
            timeout_ms: None,
            max_body_bytes: None,
            eager_crumb: false,
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_crumb_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.crumb_file = Some(path.into());
        self
    }

    pub fn with_max_redirects(mut self, hops: u32) -> Self {
        self.max_redirects = hops;
        self
    }

    pub fn with_unclassified(mut self, policy: UnclassifiedPolicy) -> Self {
        self.unclassified = policy;
        self
    }

    /// Sub-millisecond remainders round up, so a non-zero duration never
    /// becomes a zero timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn with_max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    pub fn with_eager_crumb(mut self, eager: bool) -> Self {
        self.eager_crumb = eager;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
