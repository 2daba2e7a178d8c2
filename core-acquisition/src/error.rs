//! # Acquisition Error Types

use bridge_traits::BridgeError;
use std::fmt;
use thiserror::Error;

/// Which network failure class a request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connection,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::Connection => write!(f, "connection"),
        }
    }
}

/// Errors produced while obtaining a playable video URL.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Connection refused/reset or request timed out.
    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// Endpoint answered with something other than 200.
    #[error("Endpoint {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// Body was neither JSON nor text containing a URL.
    #[error("Malformed response: {0}")]
    Parse(String),

    /// Body parsed but carried no usable URL.
    #[error("No video URL found in response from {0}")]
    EmptyResult(String),

    /// Every attempt failed.
    #[error("All {attempts} acquisition attempts failed")]
    Exhausted { attempts: u32 },

    /// Any other request failure.
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl AcquisitionError {
    /// Whether this failure counts toward rotating to the next endpoint.
    ///
    /// Unclassified request failures consume an attempt but leave the
    /// endpoint's failure streak alone.
    pub fn counts_toward_rotation(&self) -> bool {
        matches!(
            self,
            AcquisitionError::Network { .. }
                | AcquisitionError::Status { .. }
                | AcquisitionError::Parse(_)
                | AcquisitionError::EmptyResult(_)
        )
    }
}

impl From<BridgeError> for AcquisitionError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(message) => AcquisitionError::Network {
                kind: NetworkErrorKind::Timeout,
                message,
            },
            BridgeError::Connection(message) => AcquisitionError::Network {
                kind: NetworkErrorKind::Connection,
                message,
            },
            other => AcquisitionError::Request(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
