//! Error types for the CoFHE client.
//!
//! One enum, tagged by kind. [`CofheError::code`] gives the stable string
//! code for each kind; unexpected lower-level failures become
//! [`CofheError::Internal`] with the original error kept as the source.

use std::fmt;

use cofhe_core::CoreError;
use cofhe_perms::{PermsError, ValidationIssue};
use cofhe_store::StoreError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum CofheError {
    /// Unexpected failure, with the original cause attached.
    #[error("{message}: {source}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("not initialized: {0}")]
    NotInitialized(String),

    #[error("missing provider: {0}")]
    MissingProviderParam(String),

    #[error("empty security zones: {0}")]
    EmptySecurityZonesParam(String),

    /// Permit data failed validation; `issues` lists each offending field.
    #[error("invalid permit data: {message}")]
    InvalidPermitData {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("invalid permit domain: {0}")]
    InvalidPermitDomain(String),

    #[error("permit not found: {0}")]
    PermitNotFound(String),

    #[error("{0}")]
    CannotRemoveLastPermit(String),

    #[error("account uninitialized: {0}")]
    AccountUninitialized(String),

    #[error("chain id uninitialized: {0}")]
    ChainIdUninitialized(String),

    #[error("FHE key not found: {0}")]
    FheKeyNotFound(String),

    #[error("CRS not found: {0}")]
    CrsNotFound(String),

    #[error("provider not initialized: {0}")]
    ProviderNotInitialized(String),

    #[error("signer not initialized: {0}")]
    SignerNotInitialized(String),

    #[error("sealoutput failed: {0}")]
    SealOutputFailed(String),

    #[error("sealoutput returned null: {0}")]
    SealOutputReturnedNull(String),

    #[error("invalid utype: {0}")]
    InvalidUtype(String),

    #[error("decrypt failed: {0}")]
    DecryptFailed(String),

    #[error("decrypt returned null: {0}")]
    DecryptReturnedNull(String),

    #[error("mock insertPackedCtHashes failed: {0}")]
    ZkVerifyInsertPackedCtHashesFailed(String),

    #[error("mock zk verifier signing failed: {0}")]
    ZkVerifySignFailed(String),

    #[error("zk verification failed: {0}")]
    ZkVerifyFailed(String),

    #[error("encrypt remaining in items: {0}")]
    EncryptRemainingInItems(String),
}

/// Stable error codes, one per [`CofheError`] kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InternalError,
    UnknownEnvironment,
    NotInitialized,
    MissingProviderParam,
    EmptySecurityZonesParam,
    InvalidPermitData,
    InvalidPermitDomain,
    PermitNotFound,
    CannotRemoveLastPermit,
    AccountUninitialized,
    ChainIdUninitialized,
    FheKeyNotFound,
    CrsNotFound,
    ProviderNotInitialized,
    SignerNotInitialized,
    SealOutputFailed,
    SealOutputReturnedNull,
    InvalidUtype,
    DecryptFailed,
    DecryptReturnedNull,
    ZkVerifyInsertPackedCtHashesFailed,
    ZkVerifySignFailed,
    ZkVerifyFailed,
    EncryptRemainingInItems,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownEnvironment => "UNKNOWN_ENVIRONMENT",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::MissingProviderParam => "MISSING_PROVIDER_PARAM",
            ErrorCode::EmptySecurityZonesParam => "EMPTY_SECURITY_ZONES_PARAM",
            ErrorCode::InvalidPermitData => "INVALID_PERMIT_DATA",
            ErrorCode::InvalidPermitDomain => "INVALID_PERMIT_DOMAIN",
            ErrorCode::PermitNotFound => "PERMIT_NOT_FOUND",
            ErrorCode::CannotRemoveLastPermit => "CANNOT_REMOVE_LAST_PERMIT",
            ErrorCode::AccountUninitialized => "ACCOUNT_UNINITIALIZED",
            ErrorCode::ChainIdUninitialized => "CHAIN_ID_UNINITIALIZED",
            ErrorCode::FheKeyNotFound => "FHE_KEY_NOT_FOUND",
            ErrorCode::CrsNotFound => "CRS_NOT_FOUND",
            ErrorCode::ProviderNotInitialized => "PROVIDER_NOT_INITIALIZED",
            ErrorCode::SignerNotInitialized => "SIGNER_NOT_INITIALIZED",
            ErrorCode::SealOutputFailed => "SEAL_OUTPUT_FAILED",
            ErrorCode::SealOutputReturnedNull => "SEAL_OUTPUT_RETURNED_NULL",
            ErrorCode::InvalidUtype => "INVALID_UTYPE",
            ErrorCode::DecryptFailed => "DECRYPT_FAILED",
            ErrorCode::DecryptReturnedNull => "DECRYPT_RETURNED_NULL",
            ErrorCode::ZkVerifyInsertPackedCtHashesFailed => {
                "ZK_VERIFY_INSERT_PACKED_CT_HASHES_FAILED"
            }
            ErrorCode::ZkVerifySignFailed => "ZK_VERIFY_SIGN_FAILED",
            ErrorCode::ZkVerifyFailed => "ZK_VERIFY_FAILED",
            ErrorCode::EncryptRemainingInItems => "ENCRYPT_REMAINING_IN_ITEMS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CofheError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CofheError::Internal { .. } => ErrorCode::InternalError,
            CofheError::UnknownEnvironment(_) => ErrorCode::UnknownEnvironment,
            CofheError::NotInitialized(_) => ErrorCode::NotInitialized,
            CofheError::MissingProviderParam(_) => ErrorCode::MissingProviderParam,
            CofheError::EmptySecurityZonesParam(_) => ErrorCode::EmptySecurityZonesParam,
            CofheError::InvalidPermitData { .. } => ErrorCode::InvalidPermitData,
            CofheError::InvalidPermitDomain(_) => ErrorCode::InvalidPermitDomain,
            CofheError::PermitNotFound(_) => ErrorCode::PermitNotFound,
            CofheError::CannotRemoveLastPermit(_) => ErrorCode::CannotRemoveLastPermit,
            CofheError::AccountUninitialized(_) => ErrorCode::AccountUninitialized,
            CofheError::ChainIdUninitialized(_) => ErrorCode::ChainIdUninitialized,
            CofheError::FheKeyNotFound(_) => ErrorCode::FheKeyNotFound,
            CofheError::CrsNotFound(_) => ErrorCode::CrsNotFound,
            CofheError::ProviderNotInitialized(_) => ErrorCode::ProviderNotInitialized,
            CofheError::SignerNotInitialized(_) => ErrorCode::SignerNotInitialized,
            CofheError::SealOutputFailed(_) => ErrorCode::SealOutputFailed,
            CofheError::SealOutputReturnedNull(_) => ErrorCode::SealOutputReturnedNull,
            CofheError::InvalidUtype(_) => ErrorCode::InvalidUtype,
            CofheError::DecryptFailed(_) => ErrorCode::DecryptFailed,
            CofheError::DecryptReturnedNull(_) => ErrorCode::DecryptReturnedNull,
            CofheError::ZkVerifyInsertPackedCtHashesFailed(_) => {
                ErrorCode::ZkVerifyInsertPackedCtHashesFailed
            }
            CofheError::ZkVerifySignFailed(_) => ErrorCode::ZkVerifySignFailed,
            CofheError::ZkVerifyFailed(_) => ErrorCode::ZkVerifyFailed,
            CofheError::EncryptRemainingInItems(_) => ErrorCode::EncryptRemainingInItems,
        }
    }

    /// Wrap an unexpected failure.
    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        CofheError::Internal {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Map a collaborator failure: a `CofheError` raised inside a collaborator
    /// keeps its kind, anything else becomes `Internal`.
    pub fn from_collaborator(message: impl Into<String>, err: anyhow::Error) -> Self {
        match err.downcast::<CofheError>() {
            Ok(inner) => inner,
            Err(err) => CofheError::internal(message, err),
        }
    }
}

impl From<PermsError> for CofheError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::InvalidPermitData(errors) => CofheError::InvalidPermitData {
                message: errors.to_string(),
                issues: errors.0,
            },
            PermsError::MissingSigner(msg) => CofheError::SignerNotInitialized(msg),
            PermsError::Core(core) => core.into(),
            other => CofheError::internal("permit operation failed", other),
        }
    }
}

impl From<StoreError> for CofheError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CannotRemoveLastPermit { .. } => {
                CofheError::CannotRemoveLastPermit(e.to_string())
            }
            other => CofheError::internal("store operation failed", other),
        }
    }
}

impl From<CoreError> for CofheError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidUtype(msg) => CofheError::InvalidUtype(msg),
            other => CofheError::internal("invalid value", other),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, CofheError>;
