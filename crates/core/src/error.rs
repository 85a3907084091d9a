//! Error types for the ConvoQuery domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Failures are split by the level at which they are handled: a run-level
//! [`Error`] aborts the whole run, while [`ProviderError`] and
//! [`DispatchError`] are caught per (session, query) pair.

use std::time::Duration;
use thiserror::Error;

/// The top-level error type for ConvoQuery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing credential or empty session/query lists. Fails the run before
    /// any dispatch.
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// A second run was started on an orchestrator that is still busy.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a completion service, classified by status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// HTTP 429.
    #[error("Rate limited by completion service: {0}")]
    RateLimited(String),

    /// HTTP 503 / 504.
    #[error("Completion service unavailable (status: {status_code})")]
    ServiceUnavailable { status_code: u16 },

    /// Any other non-success status, or a success body without a usable choice.
    #[error("Request failed: {message}")]
    RequestFailed {
        status_code: Option<u16>,
        message: String,
    },

    /// Network-level failure before a status was received.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// The generic message used when the service body cannot be parsed.
    pub fn api_call_failed(status_code: u16) -> Self {
        Self::RequestFailed {
            status_code: Some(status_code),
            message: format!("API call failed: {status_code}"),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// A failure of one (session, query) pair inside a run.
///
/// Never aborts the run: the scheduler turns it into a placeholder answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// No request slot became free within the admission window.
    #[error("No request slot freed within {}ms", waited.as_millis())]
    QueueTimeout { waited: Duration },
}

impl DispatchError {
    /// Short human-readable text stored as the answer for a failed query.
    pub fn placeholder(&self) -> String {
        match self {
            Self::Provider(ProviderError::RateLimited(_)) => "Error: rate limit exceeded".into(),
            Self::Provider(ProviderError::ServiceUnavailable { status_code }) => {
                format!("Error: service unavailable ({status_code})")
            }
            Self::Provider(ProviderError::RequestFailed { message, .. }) => {
                format!("Error: {message}")
            }
            Self::Provider(ProviderError::Transport(_)) => "Error: network failure".into(),
            Self::QueueTimeout { .. } => "Skipped: no free request slot".into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_rate_limited())
    }
}
