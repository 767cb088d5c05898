//! Crumb-aware security client for a Jenkins-style build server.
//!
//! # Overview
//! `CrumbClient` POSTs to a build server, attaches the CSRF crumb header
//! (`.crumb`) when one is configured, follows a bounded number of redirects,
//! and turns rejected requests into an `AuthenticationError` the caller can
//! act on. Parsing response bodies into jobs or views is left to the caller.
//!
//! # Design
//! - `crumb`: the crumb is read from a file once per client and cached.
//! - `classify`: status/body combinations map to failures through an ordered
//!   rule table, testable without any HTTP.
//! - `http`: plain-data requests and responses behind a `Transport` trait;
//!   `UreqTransport` is the pooled default.
//! - `client`: the executor loop tying the three together.

pub mod classify;
pub mod client;
pub mod config;
pub mod crumb;
pub mod error;
pub mod http;

pub use classify::{check_response, Disposition, BAD_CRUMB_DATA};
pub use client::{CrumbClient, SecurityClient};
pub use config::{ClientConfig, UnclassifiedPolicy};
pub use crumb::{CrumbProvider, CRUMB_HEADER};
pub use error::{AuthenticationError, ConfigurationError, Result, SecurityError, TransportError};
pub use http::{HttpRequest, HttpResponse, Transport, UreqTransport};
pub use url::Url;
