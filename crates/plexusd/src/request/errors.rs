//! Errors raised while parsing and running requests.

use thiserror::Error;

use crate::forward::SubmitError;
use crate::property::SetterError;
use crate::response::ErrorCode;

/// Request text that could not be turned into a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The request text was blank.
    #[error("request text is empty")]
    Empty,
    /// The leading keyword is not a known request kind.
    #[error("unknown request keyword '{keyword}'")]
    UnknownKeyword {
        /// Keyword as written.
        keyword: String,
    },
    /// `SET` without assignments.
    #[error("SET requires at least one assignment")]
    EmptySet,
    /// `SHOW` without a property name.
    #[error("SHOW requires a property name")]
    MissingName,
    /// An assignment without `=`.
    #[error("assignment '{assignment}' is missing '='")]
    MissingEquals {
        /// Assignment text as written.
        assignment: String,
    },
    /// A property name is empty or contains invalid characters.
    #[error("invalid property name '{name}'")]
    InvalidName {
        /// Name as written.
        name: String,
    },
    /// An assignment without a value.
    #[error("assignment to '{name}' has no value")]
    EmptyValue {
        /// Property name.
        name: String,
    },
    /// A quoted value is not closed, or a quote appears mid-value.
    #[error("unbalanced quote in request text")]
    UnbalancedQuote,
}

/// Faults that stop a request and fail it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// A setter signalled an internal fault.
    #[error(transparent)]
    Setter(#[from] SetterError),
    /// The leader answered the relayed request with a failure.
    #[error("leader failed the relayed request: {reason}")]
    Upstream {
        /// Failure reported by the leader.
        reason: String,
    },
    /// The request could not be relayed to the leader.
    #[error("failed to relay request to the leader: {0}")]
    Submit(#[source] SubmitError),
    /// A follower has no leader to relay to.
    #[error("no leader is known to this follower")]
    NoLeader,
}

impl RunError {
    /// Error code reported to the client for this fault.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Setter(_) | Self::NoLeader => ErrorCode::Internal,
            Self::Upstream { .. } | Self::Submit(_) => ErrorCode::UpstreamFailure,
        }
    }
}
