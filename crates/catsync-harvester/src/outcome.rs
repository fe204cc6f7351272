//! Tagged result of a single HTTP attempt.
//!
//! The transport never raises: every way an attempt can end is a
//! [`RequestOutcome`] variant, and the executor switches on it explicitly.

use std::time::Duration;

use crate::types::SearchPayload;

/// Connect and read timeouts applied to one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl AttemptTimeouts {
    /// Splits a ladder rung into a short connect timeout
    /// (`min(max_connect, rung - 1s)`) and the full rung as read timeout.
    ///
    /// Rungs of one second or less use the rung itself for both.
    #[must_use]
    pub fn from_rung(rung: Duration, max_connect: Duration) -> Self {
        let connect = max_connect.min(rung.saturating_sub(Duration::from_secs(1)));
        let connect = if connect.is_zero() { rung } else { connect };
        Self {
            connect,
            read: rung,
        }
    }
}

#[derive(Debug)]
pub enum RequestOutcome {
    Success(SearchPayload),
    /// HTTP 429.
    RateLimited,
    /// Any 5xx status.
    ServerError(u16),
    /// Any other non-2xx status.
    ClientError(u16),
    Timeout,
    /// Connection refused or reset before a response arrived.
    ConnectionError,
    /// 2xx response whose body is not the expected JSON shape.
    Malformed(String),
    Unexpected(String),
}

/// Payload-free discriminant of [`RequestOutcome`], used for logging and
/// for remembering why a page was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    RateLimited,
    ServerError(u16),
    ClientError(u16),
    Timeout,
    ConnectionError,
    Malformed,
    Unexpected,
}

impl RequestOutcome {
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RequestOutcome::Success(_) => OutcomeKind::Success,
            RequestOutcome::RateLimited => OutcomeKind::RateLimited,
            RequestOutcome::ServerError(code) => OutcomeKind::ServerError(*code),
            RequestOutcome::ClientError(code) => OutcomeKind::ClientError(*code),
            RequestOutcome::Timeout => OutcomeKind::Timeout,
            RequestOutcome::ConnectionError => OutcomeKind::ConnectionError,
            RequestOutcome::Malformed(_) => OutcomeKind::Malformed,
            RequestOutcome::Unexpected(_) => OutcomeKind::Unexpected,
        }
    }

    /// Free-form detail carried by malformed/unexpected outcomes.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            RequestOutcome::Malformed(d) | RequestOutcome::Unexpected(d) => Some(d),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::RateLimited => write!(f, "rate_limited"),
            OutcomeKind::ServerError(code) => write!(f, "server_error({code})"),
            OutcomeKind::ClientError(code) => write!(f, "client_error({code})"),
            OutcomeKind::Timeout => write!(f, "timeout"),
            OutcomeKind::ConnectionError => write!(f, "connection_error"),
            OutcomeKind::Malformed => write!(f, "malformed_payload"),
            OutcomeKind::Unexpected => write!(f, "unexpected"),
        }
    }
}
