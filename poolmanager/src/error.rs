// Copyright 2020 Joyent, Inc.

use std::error::Error as StdError;
use std::fmt;

use crate::selection::SelectedPool;

/// The errors produced by pool selection and by the selection-and-engagement
/// protocol.
///
/// The variants fall into the classes described below. Configuration errors
/// are raised when a partition is built or updated, never in the middle of a
/// selection. Transient errors are retried by
/// [`PoolManagerAdapterProxy`](../adapter/struct.PoolManagerAdapterProxy.html)
/// while its budget lasts; everything else is surfaced to the caller as is.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    // Configuration errors
    /// A property value could not be parsed as the expected type.
    MalformedProperty {
        key: String,
        value: String,
        expected: &'static str,
    },
    /// A property was looked up that no layer defines.
    MissingProperty(String),
    /// A property was set that the partition type does not recognize.
    UnknownProperty(String),
    /// A property value parsed but is outside its permitted range.
    InvalidProperty { key: String, reason: String },
    /// No factory is registered under this partition type name.
    UnknownPartitionType(String),
    /// No partition is registered under this name.
    UnknownPartition(String),
    /// A partition setup document could not be read.
    InvalidSetup(String),

    // No eligible pool
    /// The candidate list handed to a selection was empty.
    NoCandidates,
    /// No candidate pool has enough space for the file.
    AllPoolsFull { file_size: u64 },
    /// The best candidate is too expensive. `pool` carries the pool that would
    /// have been chosen when the caller may still fall back to it.
    CostExceeded {
        pool: Option<Box<SelectedPool>>,
        fallback_exceeded: bool,
        cost_cut_exceeded: bool,
    },
    /// All replication source pools are above the alert cost.
    SourceCostExceeded(String),
    /// No replication destination is below the permitted cost.
    DestinationCostExceeded(String),
    /// The selection is refused by policy.
    PermissionDenied(String),

    // Transient transport/availability errors
    /// The message could not be routed to its destination.
    NoRoute(String),
    /// No reply arrived within the timeout of a single call.
    Timeout(String),
    /// The file is not (yet) available on any online pool.
    FileNotInCache(String),

    // Protocol errors
    /// A reply did not match the request it answers.
    ProtocolViolation(String),
    /// The remote side failed the request.
    Remote { code: i32, message: String },

    /// The whole selection-and-engagement budget is spent.
    InternalTimeout { timeout_ms: u64, attempts: u32 },
}

impl Error {
    /// Whether the engagement protocol should retry after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::NoRoute(_) | Error::Timeout(_) | Error::FileNotInCache(_) => {
                true
            }
            _ => false,
        }
    }

    pub fn is_configuration(&self) -> bool {
        match self {
            Error::MalformedProperty { .. }
            | Error::MissingProperty(_)
            | Error::UnknownProperty(_)
            | Error::InvalidProperty { .. }
            | Error::UnknownPartitionType(_)
            | Error::UnknownPartition(_)
            | Error::InvalidSetup(_) => true,
            _ => false,
        }
    }

    /// Whether this error means no pool could be selected from the candidates.
    pub fn is_no_eligible_pool(&self) -> bool {
        match self {
            Error::NoCandidates
            | Error::AllPoolsFull { .. }
            | Error::CostExceeded { .. }
            | Error::SourceCostExceeded(_)
            | Error::DestinationCostExceeded(_)
            | Error::PermissionDenied(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::InvalidSetup(error.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedProperty {
                key,
                value,
                expected,
            } => write!(
                fmt,
                "property {} has malformed value '{}': expected {}",
                key, value, expected
            ),
            Error::MissingProperty(key) => {
                write!(fmt, "property {} is not defined", key)
            }
            Error::UnknownProperty(key) => {
                write!(fmt, "unknown property: {}", key)
            }
            Error::InvalidProperty { key, reason } => {
                write!(fmt, "invalid value for property {}: {}", key, reason)
            }
            Error::UnknownPartitionType(t) => {
                write!(fmt, "unknown partition type: {}", t)
            }
            Error::UnknownPartition(name) => {
                write!(fmt, "partition not found: {}", name)
            }
            Error::InvalidSetup(reason) => {
                write!(fmt, "invalid partition setup: {}", reason)
            }
            Error::NoCandidates => write!(fmt, "no candidate pools"),
            Error::AllPoolsFull { file_size } => write!(
                fmt,
                "all pools are full: no pool can hold {} bytes",
                file_size
            ),
            Error::CostExceeded {
                pool,
                fallback_exceeded,
                cost_cut_exceeded,
            } => {
                write!(fmt, "cost limit exceeded")?;
                if let Some(pool) = pool {
                    write!(fmt, " by pool {}", pool.name)?;
                }
                write!(
                    fmt,
                    " (fallback: {}, cost cut: {})",
                    fallback_exceeded, cost_cut_exceeded
                )
            }
            Error::SourceCostExceeded(msg)
            | Error::DestinationCostExceeded(msg)
            | Error::PermissionDenied(msg) => msg.fmt(fmt),
            Error::NoRoute(dest) => write!(fmt, "no route to {}", dest),
            Error::Timeout(dest) => {
                write!(fmt, "timeout waiting for reply from {}", dest)
            }
            Error::FileNotInCache(msg) => {
                write!(fmt, "file not in cache: {}", msg)
            }
            Error::ProtocolViolation(msg) => {
                write!(fmt, "protocol violation: {}", msg)
            }
            Error::Remote { code, message } => {
                write!(fmt, "remote failure [{}]: {}", code, message)
            }
            Error::InternalTimeout {
                timeout_ms,
                attempts,
            } => write!(
                fmt,
                "internal timeout: no pool engaged within {} ms \
                 ({} selection attempts)",
                timeout_ms, attempts
            ),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        assert!(Error::NoRoute("PoolManager".into()).is_transient());
        assert!(Error::Timeout("PoolManager".into()).is_transient());
        assert!(Error::FileNotInCache("0001".into()).is_transient());
        assert!(!Error::ProtocolViolation("bad pool".into()).is_transient());
        assert!(!Error::InternalTimeout {
            timeout_ms: 10,
            attempts: 1
        }
        .is_transient());

        assert!(Error::UnknownPartitionType("foo".into()).is_configuration());
        assert!(!Error::NoCandidates.is_configuration());
        assert!(Error::AllPoolsFull { file_size: 1 }.is_no_eligible_pool());
    }

    #[test]
    fn internal_timeout_is_distinct_from_call_timeout() {
        let call = Error::Timeout("pool_a".into());
        let overall = Error::InternalTimeout {
            timeout_ms: 500,
            attempts: 3,
        };
        assert_ne!(call, overall);
        assert!(overall.to_string().starts_with("internal timeout"));
    }
}
