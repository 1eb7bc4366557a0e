//! Error taxonomy for the access layer.
//!
//! Every failure the client can produce is an [`ApiError`]. The enum is
//! `Clone` because a single upstream failure is replayed to every caller
//! coalesced onto the same in-flight request.
//!
//! Retry decisions are made from the variant alone (see
//! [`ApiError::is_transient`]): rate limiting, server errors, timeouts and
//! connection failures are retried; everything else is surfaced immediately.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the MBTA client and its supporting layers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// A caller-supplied parameter failed validation. Never reaches the network.
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Upstream rejected the request (HTTP 4xx other than 429).
    #[error("upstream rejected request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// A single-resource lookup returned no data.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Upstream throttled the request (HTTP 429).
    #[error("rate limited by upstream (HTTP 429){}", .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Upstream failed (HTTP 5xx).
    #[error("upstream server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The response body did not match the expected document shape.
    #[error("could not decode upstream response: {0}")]
    Decode(String),

    /// A transient failure persisted through every retry attempt.
    #[error("service unavailable, retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<ApiError> },

    /// The client could not be constructed from its configuration.
    #[error("invalid client configuration: {0}")]
    Configuration(String),

    /// A background request task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for [`ApiError::InvalidArgument`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::Server { .. }
                | ApiError::Timeout(_)
                | ApiError::Connection(_)
        )
    }

    /// Whether the upstream service rejected the request as malformed or
    /// unknown (as opposed to being unavailable).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::Rejected { .. } | ApiError::NotFound { .. })
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify a non-success HTTP status into the matching variant.
    pub fn from_status(status: u16, detail: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => ApiError::RateLimited { retry_after },
            404 if detail.is_empty() => ApiError::NotFound {
                resource: "resource".into(),
            },
            400..=499 => ApiError::Rejected { status, detail },
            _ => ApiError::Server { status, detail },
        }
    }
}
