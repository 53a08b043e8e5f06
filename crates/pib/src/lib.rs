//! Public-key information base (PIB) for AetherCore identities.
//!
//! The PIB is the bookkeeping record of which identities a principal
//! controls, which public keys belong to each identity, which certificates
//! attest each key, and which identity, key and certificate are the
//! current defaults for signing. It does not verify signatures or
//! interpret key bytes; private keys live in a TPM named by an opaque
//! locator string.
//!
//! # Backends
//!
//! - [`PibMemory`]: transient, in-process maps
//! - [`PibSqlite`]: durable SQLite database (feature `sqlite`)
//!
//! Both implement [`PibImpl`] and behave identically, including the errors
//! they return. Pick one at startup with [`open_pib`].
//!
//! # Example
//! ```
//! use aethercore_core::{naming, Name};
//! use aethercore_pib::{PibImpl, PibMemory};
//!
//! let mut pib = PibMemory::new();
//! let alice: Name = "/alice".parse().unwrap();
//! let key = naming::key_name(&alice, "1");
//!
//! pib.add_key(&alice, &key, b"public key bits").unwrap();
//! assert_eq!(pib.default_identity().unwrap(), alice);
//! assert_eq!(pib.default_key_of_identity(&alice).unwrap(), key);
//! ```

pub mod config;
pub mod error;
pub mod locator;
pub mod memory;
pub mod pib_impl;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::PibConfig;
pub use error::{ErrorKind, PibError, PibResult};
pub use locator::{PibLocator, MEMORY_SCHEME, SQLITE_SCHEME};
pub use memory::PibMemory;
pub use pib_impl::PibImpl;
#[cfg(feature = "sqlite")]
pub use sqlite::PibSqlite;

use tracing::info;

/// Open the backend named by `locator`.
pub fn open_pib(locator: &PibLocator) -> PibResult<Box<dyn PibImpl>> {
    info!(locator = %locator, "Opening PIB");
    match locator {
        PibLocator::Memory => Ok(Box::new(PibMemory::new())),
        #[cfg(feature = "sqlite")]
        PibLocator::Sqlite(Some(location)) => Ok(Box::new(PibSqlite::open(location)?)),
        #[cfg(feature = "sqlite")]
        PibLocator::Sqlite(None) => Ok(Box::new(PibSqlite::open_default()?)),
        #[cfg(not(feature = "sqlite"))]
        PibLocator::Sqlite(_) => Err(PibError::InvalidLocator(format!(
            "{} support is not compiled in",
            SQLITE_SCHEME
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let pib = open_pib(&PibLocator::Memory).unwrap();
        assert_eq!(pib.scheme(), MEMORY_SCHEME);
        assert!(pib.identities().unwrap().is_empty());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_open_sqlite_location() {
        let dir = std::env::temp_dir().join(format!("test_open_pib_{}", uuid::Uuid::new_v4()));
        let pib = open_pib(&PibLocator::Sqlite(Some(dir.clone()))).unwrap();
        assert_eq!(pib.scheme(), SQLITE_SCHEME);

        drop(pib);
        std::fs::remove_dir_all(dir).ok();
    }
}
