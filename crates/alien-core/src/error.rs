//! Error types for the engine.

use crate::types::CellId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Step aborted: {0}")]
    StepAborted(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Constraint violations reported when editing the bond topology.
///
/// These are routine outcomes: editors and the stepper probe limits before
/// committing, so they are returned as values instead of being logged as
/// failures.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConnectionError {
    #[error("cell {0} does not exist")]
    UnknownCell(CellId),

    #[error("cell {0} cannot be connected to itself")]
    SelfConnection(CellId),

    #[error("cells {0} and {1} are already connected")]
    AlreadyConnected(CellId, CellId),

    #[error("cell {cell_id} already has the maximum of {max} connections")]
    ConnectionLimitExceeded { cell_id: CellId, max: usize },

    #[error("distance {distance:.3} exceeds the maximum binding distance {max:.3}")]
    DistanceExceeded { distance: f64, max: f64 },

    #[error("cells {0} and {1} are not connected")]
    NotConnected(CellId, CellId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_converts() {
        let err: Error = ConnectionError::ConnectionLimitExceeded {
            cell_id: CellId(3),
            max: 6,
        }
        .into();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.to_string().contains("maximum of 6"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
