//! Error types for Eventide core operations.
//!
//! Core errors are validation failures: a name, a limit or a connection
//! string that doesn't satisfy its contract.

use std::fmt;

/// The result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building core values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An invalid argument was provided.
    InvalidArgument {
        /// The name of the argument.
        name: &'static str,
        /// Why it was invalid.
        reason: &'static str,
    },

    /// A connection string could not be parsed.
    InvalidConnectionString {
        /// Why parsing failed.
        reason: &'static str,
    },

    /// A value exceeded its configured bound.
    LimitExceeded {
        /// Which limit was exceeded.
        limit: &'static str,
        /// The maximum allowed value.
        max: u64,
        /// The actual value that exceeded the limit.
        actual: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { name, reason } => {
                write!(f, "invalid argument '{name}': {reason}")
            }
            Self::InvalidConnectionString { reason } => {
                write!(f, "invalid connection string: {reason}")
            }
            Self::LimitExceeded { limit, max, actual } => {
                write!(f, "limit exceeded: {limit} (max={max}, actual={actual})")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument {
            name: "consumer_group",
            reason: "must not be empty",
        };
        assert_eq!(
            format!("{err}"),
            "invalid argument 'consumer_group': must not be empty"
        );
    }

    #[test]
    fn test_limit_exceeded_display() {
        let err = Error::LimitExceeded {
            limit: "checkpoint_interval",
            max: 1_000_000,
            actual: 2_000_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("checkpoint_interval"));
        assert!(msg.contains("1000000"));
        assert!(msg.contains("2000000"));
    }
}
