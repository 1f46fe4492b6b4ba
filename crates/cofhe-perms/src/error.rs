//! Error types for the permissions module.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors that can occur during permit and sealing operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Sealing key halves must each be 64 hex characters.
    #[error("sealing key length error: {0}")]
    KeyLength(String),

    /// Key or payload was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Sealing failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Box-open authentication failed or the payload was malformed.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Permit data failed validation.
    #[error("invalid permit data: {0}")]
    InvalidPermitData(ValidationErrors),

    /// A signature was requested without a signer.
    #[error("missing signer: {0}")]
    MissingSigner(String),

    /// A provider or signer call failed.
    #[error("chain interaction failed: {0}")]
    Chain(#[source] anyhow::Error),

    /// Contract call data or return data did not match the ABI.
    #[error("abi error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] cofhe_core::CoreError),
}

impl From<ValidationErrors> for PermsError {
    fn from(e: ValidationErrors) -> Self {
        PermsError::InvalidPermitData(e)
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
