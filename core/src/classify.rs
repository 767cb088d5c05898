//! Response classification.
//!
//! A response is first checked against `RULES`, an ordered table mapping
//! (status, body substring) to an `AuthenticationError`. The first matching
//! rule wins. Responses that pass the table are then sorted by
//! `Disposition`. Body substrings are matched byte for byte, case-sensitive.

use crate::error::AuthenticationError;

/// Body text the server sends when the crumb header is absent or stale.
pub const BAD_CRUMB_DATA: &str = "No valid crumb was included in the request";

const CHALLENGE: &[u16] = &[401, 403];

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub statuses: &'static [u16],
    /// `None` matches any body.
    pub needle: Option<&'static str>,
    pub failure: AuthenticationError,
}

impl Rule {
    pub fn matches(&self, status: u16, body: &str) -> bool {
        self.statuses.contains(&status) && self.needle.map_or(true, |n| body.contains(n))
    }
}

pub static RULES: [Rule; 5] = [
    Rule {
        statuses: &[404],
        needle: None,
        failure: AuthenticationError::NotFound,
    },
    Rule {
        statuses: CHALLENGE,
        needle: Some(BAD_CRUMB_DATA),
        failure: AuthenticationError::BadCrumb,
    },
    Rule {
        statuses: CHALLENGE,
        needle: Some("Unauthorized"),
        failure: AuthenticationError::BadCredentials,
    },
    Rule {
        statuses: CHALLENGE,
        needle: Some("Authentication required"),
        failure: AuthenticationError::AuthenticationRequired,
    },
    Rule {
        statuses: &[500],
        needle: None,
        failure: AuthenticationError::ServerUnavailable,
    },
];

/// Fail with the first rule in `RULES` that matches.
pub fn check_response(status: u16, body: &str) -> Result<(), AuthenticationError> {
    match RULES.iter().find(|rule| rule.matches(status, body)) {
        Some(rule) => Err(rule.failure),
        None => Ok(()),
    }
}

/// What the executor does with a response that passed `check_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Exactly 200: collect the body.
    Success,
    /// Any 3xx: collect the `Location` header and follow it.
    Redirect,
    /// Everything else, including 401/403 bodies no rule recognised.
    Unclassified,
}

impl Disposition {
    pub fn of(status: u16) -> Self {
        match status {
            200 => Disposition::Success,
            s if s / 100 == 3 => Disposition::Redirect,
            _ => Disposition::Unclassified,
        }
    }
}
