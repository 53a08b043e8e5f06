//! Core error types

use thiserror::Error;

use crate::name::Name;

/// Core error type for AetherCore
#[derive(Debug, Error)]
pub enum CoreError {
    /// Name URI could not be parsed
    #[error("Malformed name: {0}")]
    MalformedName(String),

    /// Name does not follow the `<identity>/KEY/<key-id>` convention
    #[error("Not a key name: {0}")]
    InvalidKeyName(Name),

    /// Name does not follow the `<identity>/KEY/<key-id>/<issuer>/<version>` convention
    #[error("Not a certificate name: {0}")]
    InvalidCertificateName(Name),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
