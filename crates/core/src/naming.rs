//! Naming conventions tying keys and certificates to their owners.
//!
//! - Key name: `<identity>/KEY/<key-id>`
//! - Certificate name: `<identity>/KEY/<key-id>/<issuer-id>/<version>`
//!
//! The owner of a key or certificate is never stored separately; it is
//! always recovered from the name with the helpers below.

use crate::error::{CoreError, Result};
use crate::name::{Component, Name};

/// Marker component separating the identity from the key id.
pub const KEY_COMPONENT: &str = "KEY";

fn is_key_marker(component: Option<&Component>) -> bool {
    component.map_or(false, |c| c.as_bytes() == KEY_COMPONENT.as_bytes())
}

/// Build `<identity>/KEY/<key-id>`.
pub fn key_name(identity: &Name, key_id: impl Into<Component>) -> Name {
    identity.clone().append(KEY_COMPONENT).append(key_id)
}

/// Build `<key-name>/<issuer-id>/<version>`.
pub fn certificate_name(
    key_name: &Name,
    issuer_id: impl Into<Component>,
    version: impl Into<Component>,
) -> Name {
    key_name.clone().append(issuer_id).append(version)
}

/// True if `name` is a key name with a non-empty identity.
pub fn is_key_name(name: &Name) -> bool {
    name.len() >= 3 && is_key_marker(name.get(name.len() - 2))
}

/// True if `name` is a certificate name with a non-empty identity.
pub fn is_certificate_name(name: &Name) -> bool {
    name.len() >= 5 && is_key_marker(name.get(name.len() - 4))
}

/// Identity that owns `key_name`.
pub fn identity_of_key(key_name: &Name) -> Result<Name> {
    if !is_key_name(key_name) {
        return Err(CoreError::InvalidKeyName(key_name.clone()));
    }
    Ok(key_name.prefix(key_name.len() - 2))
}

/// Key that owns `certificate_name`.
pub fn key_of_certificate(certificate_name: &Name) -> Result<Name> {
    if !is_certificate_name(certificate_name) {
        return Err(CoreError::InvalidCertificateName(certificate_name.clone()));
    }
    Ok(certificate_name.prefix(certificate_name.len() - 2))
}

/// Identity that owns `certificate_name`.
pub fn identity_of_certificate(certificate_name: &Name) -> Result<Name> {
    key_of_certificate(certificate_name).and_then(|key| identity_of_key(&key))
}
