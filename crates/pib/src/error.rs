//! Error types for PIB operations.
//!
//! Every backend reports the same variant for the same condition, so
//! callers (and the cross-backend tests) can match on variants without
//! knowing which backend they hold.

use aethercore_core::{CoreError, Name};
use thiserror::Error;

/// Broad classification of a [`PibError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request conflicts with the store contents or is malformed
    Pib,
    /// The underlying storage failed; the store should be treated as unusable
    Storage,
}

/// Errors that can occur in PIB operations.
#[derive(Debug, Error)]
pub enum PibError {
    #[error("No default identity")]
    NoDefaultIdentity,

    #[error("Identity not found: {identity}")]
    IdentityNotFound { identity: Name },

    #[error("No default key for identity: {identity}")]
    NoDefaultKey { identity: Name },

    #[error("Key not found: {key}")]
    KeyNotFound { key: Name },

    #[error("No default certificate for key: {key}")]
    NoDefaultCertificate { key: Name },

    #[error("Certificate not found: {certificate}")]
    CertificateNotFound { certificate: Name },

    #[error("TPM locator is not set")]
    TpmLocatorNotSet,

    #[error("Invalid name: {0}")]
    InvalidName(#[from] CoreError),

    #[error("Key {key} does not belong to identity {identity}")]
    KeyIdentityMismatch { identity: Name, key: Name },

    #[error("Invalid PIB locator: {0}")]
    InvalidLocator(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl PibError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "sqlite")]
            PibError::Storage(_) => ErrorKind::Storage,
            PibError::Io(_) | PibError::Corrupted(_) => ErrorKind::Storage,
            _ => ErrorKind::Pib,
        }
    }

    /// True for storage faults the store cannot recover from.
    pub fn is_storage_fault(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

/// Result type for PIB operations.
pub type PibResult<T> = Result<T, PibError>;
