//! The storage contract every PIB backend implements.
//!
//! The store holds a three level hierarchy: identities own keys, keys own
//! certificates. Each level carries an optional default pointer:
//!
//! - one default identity for the whole store,
//! - one default key per identity,
//! - one default certificate per key.
//!
//! # Invariants
//!
//! - A key's owning identity always exists; a certificate's owning key
//!   always exists. Adding a child creates missing parents.
//! - Adding an entity at a level with no default makes it the default.
//!   Adding when a default is set leaves the default alone.
//! - Removing the default entity clears the pointer; there is no fallback
//!   to a sibling.
//! - Removal cascades downward.
//! - Re-adding an existing key or certificate overwrites its bytes and
//!   changes nothing else.
//!
//! Each operation either applies completely or fails without observable
//! change.

use std::collections::BTreeSet;

use aethercore_core::{naming, Certificate, Name};

use crate::error::{PibError, PibResult};

/// Backend-independent PIB operations.
pub trait PibImpl {
    /// Locator scheme of this backend (`pib-memory`, `pib-sqlite3`).
    fn scheme(&self) -> &'static str;

    // Identity management

    fn has_identity(&self, identity: &Name) -> PibResult<bool>;

    /// Add an identity. Idempotent; the identity becomes the default if no
    /// default identity is set.
    fn add_identity(&mut self, identity: &Name) -> PibResult<()>;

    /// Remove an identity with all its keys and certificates. No-op if absent.
    fn remove_identity(&mut self, identity: &Name) -> PibResult<()>;

    fn identities(&self) -> PibResult<BTreeSet<Name>>;

    /// Fails with [`PibError::IdentityNotFound`] if the identity does not exist.
    fn set_default_identity(&mut self, identity: &Name) -> PibResult<()>;

    /// Fails with [`PibError::NoDefaultIdentity`] if no default is set.
    fn default_identity(&self) -> PibResult<Name>;

    // Key management

    fn has_key(&self, key_name: &Name) -> PibResult<bool>;

    /// Add or overwrite a key. Creates the identity if needed; the key
    /// becomes the identity's default if it has none.
    fn add_key(&mut self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()>;

    /// Remove a key with all its certificates. No-op if absent.
    fn remove_key(&mut self, key_name: &Name) -> PibResult<()>;

    fn key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>>;

    /// Keys of `identity`; empty if the identity does not exist.
    fn keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>>;

    fn set_default_key_of_identity(&mut self, identity: &Name, key_name: &Name) -> PibResult<()>;

    fn default_key_of_identity(&self, identity: &Name) -> PibResult<Name>;

    // Certificate management

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool>;

    /// Add or overwrite a certificate. Creates the key (with the
    /// certificate's public key as bits) and identity if needed; the
    /// certificate becomes the key's default if it has none.
    fn add_certificate(&mut self, certificate: &Certificate) -> PibResult<()>;

    /// Remove a certificate. No-op if absent.
    fn remove_certificate(&mut self, cert_name: &Name) -> PibResult<()>;

    fn certificate(&self, cert_name: &Name) -> PibResult<Certificate>;

    /// Certificates of `key_name`; empty if the key does not exist.
    fn certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>>;

    fn set_default_certificate_of_key(&mut self, key_name: &Name, cert_name: &Name)
        -> PibResult<()>;

    fn default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate>;

    // Settings

    fn set_tpm_locator(&mut self, locator: &str) -> PibResult<()>;

    /// Fails with [`PibError::TpmLocatorNotSet`] if never set.
    fn tpm_locator(&self) -> PibResult<String>;

    /// Drop every identity, key and certificate and all default pointers.
    /// The TPM locator is kept.
    fn reset(&mut self) -> PibResult<()>;
}

/// Check that `key_name` is a key name owned by `identity`.
pub(crate) fn check_key_owner(identity: &Name, key_name: &Name) -> PibResult<()> {
    let owner = naming::identity_of_key(key_name)?;
    if owner != *identity {
        return Err(PibError::KeyIdentityMismatch {
            identity: identity.clone(),
            key: key_name.clone(),
        });
    }
    Ok(())
}
