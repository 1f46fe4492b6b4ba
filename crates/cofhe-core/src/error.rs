//! Error types for the CoFHE core primitives.

use thiserror::Error;

/// Errors produced by the pure primitives in this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("integer overflow: value does not fit in {bits} bits")]
    Overflow { bits: u32 },

    #[error("invalid utype :: {0}")]
    InvalidUtype(String),

    #[error("value out of range for {utype}: {value}")]
    OutOfRange { utype: String, value: String },

    #[error("malformed zkpok metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid signature recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("missing encrypted input for item at position {0}")]
    MissingInItem(usize),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
