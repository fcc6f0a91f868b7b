//! Strongly-typed identifiers for Eventide entities.
//!
//! Numeric identifiers wrap a `u64`; names wrap a validated `String`.
//! Both prevent passing a consumer group where a stream was expected.

use std::fmt;

use crate::limits::NAME_LENGTH_MAX;
use crate::{Error, Result};

/// Macro to generate strongly-typed numeric ID wrappers.
///
/// Each ID type wraps a u64 and provides:
/// - Type safety (can't mix a `PartitionId` with a plain count)
/// - Debug/Display formatting
/// - Zero-cost abstraction (same as raw u64)
macro_rules! define_id {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new ID from a raw u64 value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw u64 value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

/// Macro to generate validated name wrappers.
///
/// Names are used verbatim in storage paths and transport addresses, so
/// they must be non-empty, bounded, and free of `/`.
macro_rules! define_name {
    ($name:ident, $arg:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates a validated name.
            ///
            /// # Errors
            ///
            /// Returns `InvalidArgument` if the name is empty, longer than
            /// `NAME_LENGTH_MAX` bytes, contains `/` or a control character,
            /// or is `.` or `..`.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                validate_name($arg, &value)?;
                Ok(Self(value))
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

fn validate_name(name: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument {
            name,
            reason: "must not be empty",
        });
    }
    if value.len() > NAME_LENGTH_MAX {
        return Err(Error::InvalidArgument {
            name,
            reason: "too long",
        });
    }
    if value.chars().any(|c| c == '/' || c.is_control()) {
        return Err(Error::InvalidArgument {
            name,
            reason: "must not contain '/' or control characters",
        });
    }
    // Names become path segments in blob stores.
    if value == "." || value == ".." {
        return Err(Error::InvalidArgument {
            name,
            reason: "must not be '.' or '..'",
        });
    }
    Ok(())
}

define_id!(PartitionId, "partition", "Identifier for a partition within a stream.");

define_name!(StreamId, "stream_id", "Name of an event stream (hub).");
define_name!(ConsumerGroup, "consumer_group", "Name of a consumer group reading a stream.");

impl ConsumerGroup {
    /// Returns the service's default consumer group.
    #[must_use]
    pub fn default_group() -> Self {
        Self(crate::limits::DEFAULT_CONSUMER_GROUP.to_string())
    }
}

impl Default for ConsumerGroup {
    fn default() -> Self {
        Self::default_group()
    }
}
