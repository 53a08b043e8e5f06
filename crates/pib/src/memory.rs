//! Transient in-memory PIB.
//!
//! The hierarchy is held as nested maps, so removing an identity or a key
//! drops its whole subtree at once. Default pointers are names resolved on
//! read. The store is not synchronized; wrap it in a mutex to share it
//! between threads.

use std::collections::{BTreeMap, BTreeSet};

use aethercore_core::{naming, Certificate, Name};
use tracing::{debug, info};

use crate::error::{PibError, PibResult};
use crate::locator::MEMORY_SCHEME;
use crate::pib_impl::{check_key_owner, PibImpl};

#[derive(Debug, Default)]
struct KeyRecord {
    bits: Vec<u8>,
    certificates: BTreeMap<Name, Certificate>,
    default_certificate: Option<Name>,
}

#[derive(Debug, Default)]
struct IdentityRecord {
    keys: BTreeMap<Name, KeyRecord>,
    default_key: Option<Name>,
}

/// In-memory PIB backend.
#[derive(Debug, Default)]
pub struct PibMemory {
    identities: BTreeMap<Name, IdentityRecord>,
    default_identity: Option<Name>,
    tpm_locator: Option<String>,
}

impl PibMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_record(&self, key_name: &Name) -> Option<&KeyRecord> {
        let identity = naming::identity_of_key(key_name).ok()?;
        self.identities.get(&identity)?.keys.get(key_name)
    }

    fn key_record_mut(&mut self, key_name: &Name) -> Option<&mut KeyRecord> {
        let identity = naming::identity_of_key(key_name).ok()?;
        self.identities.get_mut(&identity)?.keys.get_mut(key_name)
    }

    /// Insert `identity` if missing, claiming the default identity slot if
    /// it is empty.
    fn ensure_identity(&mut self, identity: &Name) -> &mut IdentityRecord {
        if self.default_identity.is_none() {
            self.default_identity = Some(identity.clone());
        }
        self.identities.entry(identity.clone()).or_default()
    }
}

impl PibImpl for PibMemory {
    fn scheme(&self) -> &'static str {
        MEMORY_SCHEME
    }

    fn has_identity(&self, identity: &Name) -> PibResult<bool> {
        Ok(self.identities.contains_key(identity))
    }

    fn add_identity(&mut self, identity: &Name) -> PibResult<()> {
        self.ensure_identity(identity);
        debug!(identity = %identity, "Identity added");
        Ok(())
    }

    fn remove_identity(&mut self, identity: &Name) -> PibResult<()> {
        if self.identities.remove(identity).is_some() {
            debug!(identity = %identity, "Identity removed");
        }
        if self.default_identity.as_ref() == Some(identity) {
            self.default_identity = None;
        }
        Ok(())
    }

    fn identities(&self) -> PibResult<BTreeSet<Name>> {
        Ok(self.identities.keys().cloned().collect())
    }

    fn set_default_identity(&mut self, identity: &Name) -> PibResult<()> {
        if !self.identities.contains_key(identity) {
            return Err(PibError::IdentityNotFound {
                identity: identity.clone(),
            });
        }
        self.default_identity = Some(identity.clone());
        Ok(())
    }

    fn default_identity(&self) -> PibResult<Name> {
        self.default_identity
            .clone()
            .ok_or(PibError::NoDefaultIdentity)
    }

    fn has_key(&self, key_name: &Name) -> PibResult<bool> {
        Ok(self.key_record(key_name).is_some())
    }

    fn add_key(&mut self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()> {
        check_key_owner(identity, key_name)?;

        let record = self.ensure_identity(identity);
        record.keys.entry(key_name.clone()).or_default().bits = key_bits.to_vec();
        if record.default_key.is_none() {
            record.default_key = Some(key_name.clone());
        }

        debug!(identity = %identity, key = %key_name, bits_len = key_bits.len(), "Key added");
        Ok(())
    }

    fn remove_key(&mut self, key_name: &Name) -> PibResult<()> {
        let Ok(identity) = naming::identity_of_key(key_name) else {
            return Ok(());
        };
        if let Some(record) = self.identities.get_mut(&identity) {
            if record.keys.remove(key_name).is_some() {
                debug!(key = %key_name, "Key removed");
            }
            if record.default_key.as_ref() == Some(key_name) {
                record.default_key = None;
            }
        }
        Ok(())
    }

    fn key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>> {
        self.key_record(key_name)
            .map(|record| record.bits.clone())
            .ok_or_else(|| PibError::KeyNotFound {
                key: key_name.clone(),
            })
    }

    fn keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>> {
        Ok(self
            .identities
            .get(identity)
            .map(|record| record.keys.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn set_default_key_of_identity(&mut self, identity: &Name, key_name: &Name) -> PibResult<()> {
        let record = self
            .identities
            .get_mut(identity)
            .ok_or_else(|| PibError::IdentityNotFound {
                identity: identity.clone(),
            })?;
        if !record.keys.contains_key(key_name) {
            return Err(PibError::KeyNotFound {
                key: key_name.clone(),
            });
        }
        record.default_key = Some(key_name.clone());
        Ok(())
    }

    fn default_key_of_identity(&self, identity: &Name) -> PibResult<Name> {
        let record = self
            .identities
            .get(identity)
            .ok_or_else(|| PibError::IdentityNotFound {
                identity: identity.clone(),
            })?;
        record
            .default_key
            .clone()
            .ok_or_else(|| PibError::NoDefaultKey {
                identity: identity.clone(),
            })
    }

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool> {
        let Ok(key_name) = naming::key_of_certificate(cert_name) else {
            return Ok(false);
        };
        Ok(self
            .key_record(&key_name)
            .map_or(false, |record| record.certificates.contains_key(cert_name)))
    }

    fn add_certificate(&mut self, certificate: &Certificate) -> PibResult<()> {
        let key_name = certificate.key_name();
        let identity = certificate.identity();

        if self.key_record(&key_name).is_none() {
            self.add_key(&identity, &key_name, certificate.public_key())?;
        }

        let record = self
            .key_record_mut(&key_name)
            .ok_or_else(|| PibError::KeyNotFound {
                key: key_name.clone(),
            })?;
        record
            .certificates
            .insert(certificate.name().clone(), certificate.clone());
        if record.default_certificate.is_none() {
            record.default_certificate = Some(certificate.name().clone());
        }

        debug!(certificate = %certificate.name(), key = %key_name, "Certificate added");
        Ok(())
    }

    fn remove_certificate(&mut self, cert_name: &Name) -> PibResult<()> {
        let Ok(key_name) = naming::key_of_certificate(cert_name) else {
            return Ok(());
        };
        if let Some(record) = self.key_record_mut(&key_name) {
            if record.certificates.remove(cert_name).is_some() {
                debug!(certificate = %cert_name, "Certificate removed");
            }
            if record.default_certificate.as_ref() == Some(cert_name) {
                record.default_certificate = None;
            }
        }
        Ok(())
    }

    fn certificate(&self, cert_name: &Name) -> PibResult<Certificate> {
        naming::key_of_certificate(cert_name)
            .ok()
            .and_then(|key_name| self.key_record(&key_name))
            .and_then(|record| record.certificates.get(cert_name))
            .cloned()
            .ok_or_else(|| PibError::CertificateNotFound {
                certificate: cert_name.clone(),
            })
    }

    fn certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>> {
        Ok(self
            .key_record(key_name)
            .map(|record| record.certificates.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn set_default_certificate_of_key(
        &mut self,
        key_name: &Name,
        cert_name: &Name,
    ) -> PibResult<()> {
        let record = self
            .key_record_mut(key_name)
            .ok_or_else(|| PibError::KeyNotFound {
                key: key_name.clone(),
            })?;
        if !record.certificates.contains_key(cert_name) {
            return Err(PibError::CertificateNotFound {
                certificate: cert_name.clone(),
            });
        }
        record.default_certificate = Some(cert_name.clone());
        Ok(())
    }

    fn default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate> {
        let record = self
            .key_record(key_name)
            .ok_or_else(|| PibError::KeyNotFound {
                key: key_name.clone(),
            })?;
        record
            .default_certificate
            .as_ref()
            .and_then(|name| record.certificates.get(name))
            .cloned()
            .ok_or_else(|| PibError::NoDefaultCertificate {
                key: key_name.clone(),
            })
    }

    fn set_tpm_locator(&mut self, locator: &str) -> PibResult<()> {
        self.tpm_locator = Some(locator.to_string());
        Ok(())
    }

    fn tpm_locator(&self) -> PibResult<String> {
        self.tpm_locator.clone().ok_or(PibError::TpmLocatorNotSet)
    }

    fn reset(&mut self) -> PibResult<()> {
        self.identities.clear();
        self.default_identity = None;
        info!("In-memory PIB reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn cert(uri: &str, key: &[u8]) -> Certificate {
        Certificate::new(name(uri), key.to_vec(), format!("wire:{}", uri).into_bytes()).unwrap()
    }

    #[test]
    fn test_cascade_is_subtree_removal() {
        let mut pib = PibMemory::new();
        pib.add_certificate(&cert("/alice/KEY/1/self/1", b"k1")).unwrap();
        pib.add_certificate(&cert("/alice/KEY/2/self/1", b"k2")).unwrap();

        pib.remove_identity(&name("/alice")).unwrap();

        assert!(pib.identities.is_empty());
        assert!(pib.default_identity.is_none());
        assert!(!pib.has_key(&name("/alice/KEY/1")).unwrap());
    }

    #[test]
    fn test_implicit_key_takes_certificate_public_key() {
        let mut pib = PibMemory::new();
        pib.add_certificate(&cert("/alice/KEY/1/self/1", b"embedded")).unwrap();
        assert_eq!(pib.key_bits(&name("/alice/KEY/1")).unwrap(), b"embedded");
        assert_eq!(pib.default_key_of_identity(&name("/alice")).unwrap(), name("/alice/KEY/1"));
    }

    #[test]
    fn test_rejected_add_key_leaves_store_untouched() {
        let mut pib = PibMemory::new();
        let result = pib.add_key(&name("/alice"), &name("/bob/KEY/1"), b"bits");
        assert!(matches!(result, Err(PibError::KeyIdentityMismatch { .. })));
        assert!(pib.identities().unwrap().is_empty());
        assert!(matches!(pib.default_identity(), Err(PibError::NoDefaultIdentity)));
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_reset_logs_at_info() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();

        let mut pib = PibMemory::new();
        tracing::subscriber::with_default(subscriber, || pib.reset()).unwrap();

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("INFO"));
        assert!(output.contains("In-memory PIB reset"));
    }

    #[test]
    fn test_malformed_names_are_absent() {
        let pib = PibMemory::new();
        assert!(!pib.has_key(&name("/not-a-key")).unwrap());
        assert!(!pib.has_certificate(&name("/not-a-cert")).unwrap());
        assert!(pib.certificates_of_key(&name("/not-a-key")).unwrap().is_empty());
        assert!(matches!(
            pib.key_bits(&name("/not-a-key")),
            Err(PibError::KeyNotFound { .. })
        ));
    }
}
