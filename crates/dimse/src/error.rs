//! Error types for DIMSE operations

use thiserror::Error;

use crate::codec::CodecError;

/// Result type alias for DIMSE operations
pub type Result<T> = std::result::Result<T, DimseError>;

/// Error types that can occur during DIMSE operations
#[derive(Error, Debug)]
pub enum DimseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Malformed PDU: {0}")]
    MalformedPdu(String),

    #[error("Failed to write PDU: {0}")]
    PduWrite(String),

    #[error("DICOM codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid AE Title: {0}")]
    InvalidAeTitle(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Message of {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DimseError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new malformed PDU error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPdu(msg.into())
    }

    /// Create a new storage error, typically returned by a store handler
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Check if this error only ends the current association
    ///
    /// Everything except configuration problems is absorbed at the session boundary.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DimseError::Config(_) | DimseError::InvalidAeTitle(_))
    }
}
