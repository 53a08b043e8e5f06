//! Shared fixtures for PIB integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use aethercore_core::{naming, Certificate, Name};
use aethercore_pib::{PibImpl, PibMemory};
#[cfg(feature = "sqlite")]
use aethercore_pib::PibSqlite;

/// A backend under test. SQLite stores live in a fresh temp directory that
/// is removed on drop.
pub struct TestPib {
    pib: Box<dyn PibImpl>,
    dir: Option<PathBuf>,
}

impl TestPib {
    pub fn memory() -> Self {
        Self {
            pib: Box::new(PibMemory::new()),
            dir: None,
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite() -> Self {
        let dir = temp_location("pib_test");
        let pib = PibSqlite::open(&dir).expect("Failed to open SQLite PIB");
        Self {
            pib: Box::new(pib),
            dir: Some(dir),
        }
    }

    pub fn pib(&mut self) -> &mut dyn PibImpl {
        self.pib.as_mut()
    }
}

impl Drop for TestPib {
    fn drop(&mut self) {
        // close the database before deleting its directory
        self.pib = Box::new(PibMemory::new());
        if let Some(dir) = self.dir.take() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}

pub fn temp_location(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}", tag, uuid::Uuid::new_v4()))
}

pub fn name(uri: &str) -> Name {
    uri.parse().expect("test name must parse")
}

pub fn make_certificate(key_name: &Name, version: &str, public_key: &[u8]) -> Certificate {
    let cert_name = naming::certificate_name(key_name, "issuer", version);
    let encoded = format!("encoded:{}", cert_name).into_bytes();
    Certificate::new(cert_name, public_key.to_vec(), encoded).expect("valid certificate name")
}

/// Two identities, two keys under the first, certificates for both keys.
pub struct PibData {
    pub id1: Name,
    pub id2: Name,
    pub id1_key1_name: Name,
    pub id1_key2_name: Name,
    pub id2_key1_name: Name,
    pub id1_key1: Vec<u8>,
    pub id1_key2: Vec<u8>,
    pub id1_key1_cert1: Certificate,
    pub id1_key1_cert2: Certificate,
    pub id1_key2_cert1: Certificate,
}

impl PibData {
    pub fn new() -> Self {
        let id1 = name("/pib/interface/id/1");
        let id2 = name("/pib/interface/id/2");
        let id1_key1_name = naming::key_name(&id1, "ksk-1");
        let id1_key2_name = naming::key_name(&id1, "ksk-2");
        let id2_key1_name = naming::key_name(&id2, "ksk-1");
        let id1_key1 = vec![0x30, 0x59, 0x01, 0x11];
        let id1_key2 = vec![0x30, 0x59, 0x02, 0x22, 0x22];

        Self {
            id1_key1_cert1: make_certificate(&id1_key1_name, "v1", &id1_key1),
            id1_key1_cert2: make_certificate(&id1_key1_name, "v2", &id1_key1),
            id1_key2_cert1: make_certificate(&id1_key2_name, "v1", &id1_key2),
            id1,
            id2,
            id1_key1_name,
            id1_key2_name,
            id2_key1_name,
            id1_key1,
            id1_key2,
        }
    }
}
