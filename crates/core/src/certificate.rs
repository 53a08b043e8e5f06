//! Certificate records as seen by the identity store.
//!
//! The store does not decode certificates. It keeps the encoded form as an
//! opaque blob next to the name and the embedded public key, both of which
//! the caller extracts with its own codec.

use crate::error::Result;
use crate::name::Name;
use crate::naming;

/// A named certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    name: Name,
    public_key: Vec<u8>,
    encoded: Vec<u8>,
}

impl Certificate {
    /// Create a certificate, checking that `name` follows the certificate
    /// naming convention.
    pub fn new(name: Name, public_key: Vec<u8>, encoded: Vec<u8>) -> Result<Self> {
        naming::key_of_certificate(&name)?;
        Ok(Self {
            name,
            public_key,
            encoded,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Name of the key this certificate attests.
    pub fn key_name(&self) -> Name {
        self.name.prefix(self.name.len() - 2)
    }

    /// Name of the identity owning the attested key.
    pub fn identity(&self) -> Name {
        self.name.prefix(self.name.len() - 4)
    }

    /// Public key bits embedded in the certificate.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Full encoded certificate.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Same content under a different name.
    pub fn renamed(self, name: Name) -> Result<Self> {
        Self::new(name, self.public_key, self.encoded)
    }
}
