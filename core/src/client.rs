//! Crumb-aware request executor.
//!
//! # Design
//! `CrumbClient` owns a `CrumbProvider` and a `Transport`. Every call to
//! `execute` resolves the crumb (a no-op once cached), POSTs to the target,
//! and classifies the response:
//!
//! - a classified failure (`classify::RULES`) is returned immediately;
//! - 200 returns the body;
//! - 3xx collects the raw `Location` value and follows it, up to
//!   `max_redirects` hops;
//! - anything else ends the call through `fall_through`, which applies the
//!   configured `UnclassifiedPolicy` to whatever was last collected.
//!
//! The only state kept between calls is the cached crumb.

use tracing::{debug, warn};
use url::Url;

use crate::classify::{check_response, Disposition};
use crate::config::{ClientConfig, UnclassifiedPolicy};
use crate::crumb::{CrumbProvider, CRUMB_HEADER};
use crate::error::{ConfigurationError, Result, SecurityError};
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport};

/// Operations the data-loading layer relies on.
pub trait SecurityClient {
    /// Run the handshake against `url` and discard the body. Used to check
    /// reachability and credentials up front.
    fn connect(&self, url: &str) -> Result<()>;

    /// Run the handshake against `url` and return the final body.
    fn execute(&self, url: &str) -> Result<String>;
}

/// A collected `(status, body)` pair. For redirects the body is the
/// `Location` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outcome {
    status: u16,
    body: String,
}

#[derive(Debug)]
pub struct CrumbClient<T = UreqTransport> {
    transport: T,
    crumb: CrumbProvider,
    max_redirects: u32,
    unclassified: UnclassifiedPolicy,
}

impl CrumbClient<UreqTransport> {
    /// Client over a pooled `ureq` agent.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = UreqTransport::new(config.timeout(), config.max_body_bytes);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> CrumbClient<T> {
    /// Fails only when `config.eager_crumb` is set and the crumb cannot be
    /// resolved.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let crumb = config
            .crumb_file
            .map(CrumbProvider::new)
            .unwrap_or_default();
        let client = Self {
            transport,
            crumb,
            max_redirects: config.max_redirects,
            unclassified: config.unclassified,
        };
        if config.eager_crumb {
            client.crumb.resolve_if_needed()?;
        }
        Ok(client)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn has_crumb(&self) -> bool {
        self.crumb.has_crumb()
    }

    /// POST to `url`, carrying the crumb header if one has been resolved.
    pub fn build_request(&self, url: &Url) -> HttpRequest {
        let headers = match self.crumb.value() {
            Some(crumb) => vec![(CRUMB_HEADER.to_string(), crumb.to_string())],
            None => Vec::new(),
        };
        HttpRequest {
            url: url.as_str().to_string(),
            headers,
        }
    }

    fn submit(&self, target: &Url) -> Result<HttpResponse> {
        let request = self.build_request(target);
        debug!(url = %target, crumb = request.header(CRUMB_HEADER).is_some(), "POST");
        self.transport.send(&request).map_err(|source| {
            ConfigurationError::Transport {
                url: target.to_string(),
                source,
            }
            .into()
        })
    }

    fn run(&self, url: &str) -> Result<String> {
        self.crumb.resolve_if_needed()?;

        let mut target = parse_url(url)?;
        let mut collected: Option<Outcome> = None;
        let mut hops = 0;

        loop {
            let response = self.submit(&target)?;
            let status = response.status;

            if let Err(failure) = check_response(status, &response.body) {
                warn!(url = %target, status, %failure, "request rejected");
                return Err(failure.into());
            }

            match Disposition::of(status) {
                Disposition::Success => return Ok(response.body),
                Disposition::Redirect => {
                    let location = response
                        .header("Location")
                        .ok_or_else(|| ConfigurationError::MissingLocation {
                            url: target.to_string(),
                        })?
                        .to_string();

                    if hops >= self.max_redirects {
                        warn!(url = %target, %location, hops, "redirect limit reached, not following");
                        let collected = Some(Outcome {
                            status,
                            body: location,
                        });
                        return fall_through(self.unclassified, &target, status, collected);
                    }

                    let next = target.join(&location).map_err(|source| {
                        ConfigurationError::InvalidUrl {
                            url: location.clone(),
                            source,
                        }
                    })?;
                    collected = Some(Outcome {
                        status,
                        body: location,
                    });
                    hops += 1;
                    debug!(from = %target, to = %next, hop = hops, "following redirect");
                    target = next;
                }
                Disposition::Unclassified => {
                    return fall_through(self.unclassified, &target, status, collected);
                }
            }
        }
    }
}

impl<T: Transport> SecurityClient for CrumbClient<T> {
    fn connect(&self, url: &str) -> Result<()> {
        self.run(url).map(drop)
    }

    fn execute(&self, url: &str) -> Result<String> {
        self.run(url)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| {
        ConfigurationError::InvalidUrl {
            url: url.to_string(),
            source,
        }
        .into()
    })
}

/// The branch taken when a call ends on a status that is neither 200, a
/// followed redirect, nor a classified failure.
fn fall_through(
    policy: UnclassifiedPolicy,
    target: &Url,
    status: u16,
    collected: Option<Outcome>,
) -> Result<String> {
    match policy {
        UnclassifiedPolicy::LastCollected => {
            debug!(
                url = %target,
                status,
                collected = ?collected.as_ref().map(|o| o.status),
                "unclassified response, returning last collected body"
            );
            Ok(collected.map(|o| o.body).unwrap_or_default())
        }
        UnclassifiedPolicy::Strict => Err(SecurityError::UnexpectedStatus {
            url: target.to_string(),
            status,
        }),
    }
}
