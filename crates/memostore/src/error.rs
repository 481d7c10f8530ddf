//! Error types for memostore

use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::string::FromUtf8Error;

/// Result type alias for memostore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage and cache operations
#[derive(Debug)]
pub enum Error {
    /// Live backend is misconfigured or unreachable
    Unavailable(String),

    /// Live backend rejected a command
    Backend(String),

    /// Stored bytes cannot be read as the requested type
    Decode(String),

    /// Upstream fetch failed
    Fetch(String),

    /// Operation invoked with arguments it cannot use
    InvalidArgument(String),

    /// Adapter is closed
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            Error::Backend(msg) => write!(f, "Storage error: {}", msg),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::Fetch(msg) => write!(f, "Upstream fetch error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Closed => write!(f, "Storage is closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let unreachable = err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
            || err.kind() == redis::ErrorKind::InvalidClientConfig;

        if unreachable {
            Error::Unavailable(err.to_string())
        } else {
            Error::Backend(err.to_string())
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Self {
        Error::Decode(format!("invalid UTF-8: {}", err))
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Self {
        Error::Decode(format!("invalid integer: {}", err))
    }
}

impl From<ParseFloatError> for Error {
    fn from(err: ParseFloatError) -> Self {
        Error::Decode(format!("invalid float: {}", err))
    }
}
