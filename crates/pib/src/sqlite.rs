//! Durable SQLite-backed PIB.
//!
//! # Schema
//!
//! - `identities`: one row per identity name
//! - `keys`: owned by an identity (`ON DELETE CASCADE`), with an
//!   `is_default` flag
//! - `certificates`: owned by a key (`ON DELETE CASCADE`), with an
//!   `is_default` flag
//! - `settings`: a single row holding the default identity (nullable
//!   reference, `ON DELETE SET NULL`) and the TPM locator
//!
//! Partial unique indexes allow at most one flagged key per identity and one
//! flagged certificate per key, so switching a default always clears the
//! old flag before setting the new one. Names are stored in canonical URI
//! form.
//!
//! Every mutation touching more than one row runs in a single transaction.
//! A failure drops the transaction, which rolls it back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use aethercore_core::{Certificate, Name};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::error::{PibError, PibResult};
use crate::locator::SQLITE_SCHEME;
use crate::pib_impl::{check_key_owner, PibImpl};

/// Database file created inside a directory location.
pub const DB_FILE_NAME: &str = "pib.db";

/// Directory under `$HOME` used when no location is given.
pub const DEFAULT_DIR: &str = ".aethercore";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id INTEGER PRIMARY KEY,
    identity TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS keys (
    id INTEGER PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    key_name TEXT NOT NULL UNIQUE,
    key_bits BLOB NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_keys_identity ON keys(identity_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_keys_default
    ON keys(identity_id) WHERE is_default = 1;

CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY,
    key_id INTEGER NOT NULL REFERENCES keys(id) ON DELETE CASCADE,
    certificate_name TEXT NOT NULL UNIQUE,
    certificate_data BLOB NOT NULL,
    public_key BLOB NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_certificates_key ON certificates(key_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_certificates_default
    ON certificates(key_id) WHERE is_default = 1;

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    default_identity_id INTEGER REFERENCES identities(id) ON DELETE SET NULL,
    tpm_locator TEXT
);

INSERT OR IGNORE INTO settings (id) VALUES (1);
"#;

/// SQLite PIB backend.
pub struct PibSqlite {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for PibSqlite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PibSqlite").field("path", &self.path).finish()
    }
}

impl PibSqlite {
    /// Create or open a PIB at `location`.
    ///
    /// An existing directory, or a path without an extension, is treated as
    /// a directory (created if missing) holding [`DB_FILE_NAME`]. Any other
    /// path is the database file itself.
    pub fn open(location: impl AsRef<Path>) -> PibResult<Self> {
        let path = resolve_db_path(location.as_ref());

        info!(path = %path.display(), "Opening SQLite PIB");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // cascades and SET NULL depend on this, and it is per connection
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn, path })
    }

    /// Open the PIB at [`PibSqlite::default_location`].
    pub fn open_default() -> PibResult<Self> {
        Self::open(Self::default_location()?)
    }

    /// `$HOME/.aethercore`
    pub fn default_location() -> PibResult<PathBuf> {
        let home = std::env::var_os("HOME").ok_or_else(|| {
            PibError::InvalidLocator("HOME is not set and no PIB location was given".to_string())
        })?;
        Ok(PathBuf::from(home).join(DEFAULT_DIR))
    }

    /// Database file in use.
    pub fn db_path(&self) -> &Path {
        &self.path
    }

    /// Execute raw SQL for testing purposes only
    ///
    /// Bypasses every invariant of the store. Used by tests to simulate
    /// on-disk corruption.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(&self, sql: &str) -> PibResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}

fn resolve_db_path(location: &Path) -> PathBuf {
    if location.is_dir() || location.extension().is_none() {
        location.join(DB_FILE_NAME)
    } else {
        location.to_path_buf()
    }
}

fn parse_name(uri: &str) -> PibResult<Name> {
    uri.parse()
        .map_err(|e| PibError::Corrupted(format!("stored name '{}': {}", uri, e)))
}

fn parse_names(uris: Vec<String>) -> PibResult<BTreeSet<Name>> {
    uris.iter().map(|uri| parse_name(uri)).collect()
}

fn build_certificate(name: String, public_key: Vec<u8>, data: Vec<u8>) -> PibResult<Certificate> {
    let name = parse_name(&name)?;
    Certificate::new(name, public_key, data)
        .map_err(|e| PibError::Corrupted(format!("stored certificate: {}", e)))
}

fn identity_id(conn: &Connection, identity: &Name) -> PibResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM identities WHERE identity = ?1",
            [identity.to_uri()],
            |row| row.get(0),
        )
        .optional()?)
}

fn key_id(conn: &Connection, key_name: &Name) -> PibResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM keys WHERE key_name = ?1",
            [key_name.to_uri()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Insert `identity` if missing and claim the default identity slot if it
/// is empty. Returns the identity's row id.
fn insert_identity(conn: &Connection, identity: &Name) -> PibResult<i64> {
    let uri = identity.to_uri();
    conn.execute(
        "INSERT OR IGNORE INTO identities (identity) VALUES (?1)",
        [&uri],
    )?;
    conn.execute(
        r#"
        UPDATE settings
        SET default_identity_id = (SELECT id FROM identities WHERE identity = ?1)
        WHERE id = 1 AND default_identity_id IS NULL
        "#,
        [&uri],
    )?;
    identity_id(conn, identity)?
        .ok_or_else(|| PibError::Corrupted(format!("identity {} vanished after insert", uri)))
}

/// Insert or overwrite a key and claim the identity's default key slot if
/// it is empty. Returns the key's row id.
fn upsert_key(conn: &Connection, identity_id: i64, key_name: &Name, key_bits: &[u8]) -> PibResult<i64> {
    conn.execute(
        r#"
        INSERT INTO keys (identity_id, key_name, key_bits) VALUES (?1, ?2, ?3)
        ON CONFLICT(key_name) DO UPDATE SET key_bits = excluded.key_bits
        "#,
        params![identity_id, key_name.to_uri(), key_bits],
    )?;
    let id = key_id(conn, key_name)?.ok_or_else(|| PibError::KeyNotFound {
        key: key_name.clone(),
    })?;
    conn.execute(
        r#"
        UPDATE keys SET is_default = 1
        WHERE id = ?1
          AND NOT EXISTS (SELECT 1 FROM keys WHERE identity_id = ?2 AND is_default = 1)
        "#,
        params![id, identity_id],
    )?;
    Ok(id)
}

impl PibImpl for PibSqlite {
    fn scheme(&self) -> &'static str {
        SQLITE_SCHEME
    }

    fn has_identity(&self, identity: &Name) -> PibResult<bool> {
        Ok(identity_id(&self.conn, identity)?.is_some())
    }

    fn add_identity(&mut self, identity: &Name) -> PibResult<()> {
        let tx = self.conn.transaction()?;
        insert_identity(&tx, identity)?;
        tx.commit()?;

        debug!(identity = %identity, "Identity added");
        Ok(())
    }

    fn remove_identity(&mut self, identity: &Name) -> PibResult<()> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM identities WHERE identity = ?1",
            [identity.to_uri()],
        )?;
        tx.commit()?;

        if removed > 0 {
            debug!(identity = %identity, "Identity removed");
        }
        Ok(())
    }

    fn identities(&self) -> PibResult<BTreeSet<Name>> {
        let mut stmt = self.conn.prepare("SELECT identity FROM identities")?;
        let uris = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        parse_names(uris)
    }

    fn set_default_identity(&mut self, identity: &Name) -> PibResult<()> {
        let id = identity_id(&self.conn, identity)?.ok_or_else(|| PibError::IdentityNotFound {
            identity: identity.clone(),
        })?;
        self.conn.execute(
            "UPDATE settings SET default_identity_id = ?1 WHERE id = 1",
            [id],
        )?;
        Ok(())
    }

    fn default_identity(&self) -> PibResult<Name> {
        let uri: Option<String> = self
            .conn
            .query_row(
                r#"
                SELECT i.identity
                FROM settings s JOIN identities i ON i.id = s.default_identity_id
                WHERE s.id = 1
                "#,
                [],
                |row| row.get(0),
            )
            .optional()?;
        let uri = uri.ok_or(PibError::NoDefaultIdentity)?;
        parse_name(&uri)
    }

    fn has_key(&self, key_name: &Name) -> PibResult<bool> {
        Ok(key_id(&self.conn, key_name)?.is_some())
    }

    fn add_key(&mut self, identity: &Name, key_name: &Name, key_bits: &[u8]) -> PibResult<()> {
        check_key_owner(identity, key_name)?;

        let tx = self.conn.transaction()?;
        let identity_id = insert_identity(&tx, identity)?;
        upsert_key(&tx, identity_id, key_name, key_bits)?;
        tx.commit()?;

        debug!(identity = %identity, key = %key_name, bits_len = key_bits.len(), "Key added");
        Ok(())
    }

    fn remove_key(&mut self, key_name: &Name) -> PibResult<()> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM keys WHERE key_name = ?1", [key_name.to_uri()])?;
        tx.commit()?;

        if removed > 0 {
            debug!(key = %key_name, "Key removed");
        }
        Ok(())
    }

    fn key_bits(&self, key_name: &Name) -> PibResult<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT key_bits FROM keys WHERE key_name = ?1",
                [key_name.to_uri()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PibError::KeyNotFound {
                    key: key_name.clone(),
                },
                e => PibError::Storage(e),
            })
    }

    fn keys_of_identity(&self, identity: &Name) -> PibResult<BTreeSet<Name>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT k.key_name
            FROM keys k JOIN identities i ON k.identity_id = i.id
            WHERE i.identity = ?1
            "#,
        )?;
        let uris = stmt
            .query_map([identity.to_uri()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        parse_names(uris)
    }

    fn set_default_key_of_identity(&mut self, identity: &Name, key_name: &Name) -> PibResult<()> {
        let tx = self.conn.transaction()?;

        let identity_id = identity_id(&tx, identity)?.ok_or_else(|| PibError::IdentityNotFound {
            identity: identity.clone(),
        })?;
        let key_id: i64 = tx
            .query_row(
                "SELECT id FROM keys WHERE key_name = ?1 AND identity_id = ?2",
                params![key_name.to_uri(), identity_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| PibError::KeyNotFound {
                key: key_name.clone(),
            })?;

        tx.execute(
            "UPDATE keys SET is_default = 0 WHERE identity_id = ?1 AND is_default = 1",
            [identity_id],
        )?;
        tx.execute("UPDATE keys SET is_default = 1 WHERE id = ?1", [key_id])?;
        tx.commit()?;

        debug!(identity = %identity, key = %key_name, "Default key changed");
        Ok(())
    }

    fn default_key_of_identity(&self, identity: &Name) -> PibResult<Name> {
        let identity_id =
            identity_id(&self.conn, identity)?.ok_or_else(|| PibError::IdentityNotFound {
                identity: identity.clone(),
            })?;
        let uri: String = self
            .conn
            .query_row(
                "SELECT key_name FROM keys WHERE identity_id = ?1 AND is_default = 1",
                [identity_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| PibError::NoDefaultKey {
                identity: identity.clone(),
            })?;
        parse_name(&uri)
    }

    fn has_certificate(&self, cert_name: &Name) -> PibResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM certificates WHERE certificate_name = ?1",
                [cert_name.to_uri()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn add_certificate(&mut self, certificate: &Certificate) -> PibResult<()> {
        let key_name = certificate.key_name();
        let identity = certificate.identity();

        let tx = self.conn.transaction()?;

        let key_id = match key_id(&tx, &key_name)? {
            Some(id) => id,
            None => {
                let identity_id = insert_identity(&tx, &identity)?;
                upsert_key(&tx, identity_id, &key_name, certificate.public_key())?
            }
        };

        let cert_uri = certificate.name().to_uri();
        tx.execute(
            r#"
            INSERT INTO certificates (key_id, certificate_name, certificate_data, public_key)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(certificate_name) DO UPDATE SET
                certificate_data = excluded.certificate_data,
                public_key = excluded.public_key
            "#,
            params![
                key_id,
                cert_uri,
                certificate.encoded(),
                certificate.public_key()
            ],
        )?;
        tx.execute(
            r#"
            UPDATE certificates SET is_default = 1
            WHERE certificate_name = ?1
              AND NOT EXISTS (SELECT 1 FROM certificates WHERE key_id = ?2 AND is_default = 1)
            "#,
            params![cert_uri, key_id],
        )?;
        tx.commit()?;

        debug!(certificate = %certificate.name(), key = %key_name, "Certificate added");
        Ok(())
    }

    fn remove_certificate(&mut self, cert_name: &Name) -> PibResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM certificates WHERE certificate_name = ?1",
            [cert_name.to_uri()],
        )?;
        if removed > 0 {
            debug!(certificate = %cert_name, "Certificate removed");
        }
        Ok(())
    }

    fn certificate(&self, cert_name: &Name) -> PibResult<Certificate> {
        let row: Option<(String, Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                r#"
                SELECT certificate_name, public_key, certificate_data
                FROM certificates WHERE certificate_name = ?1
                "#,
                [cert_name.to_uri()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (name, public_key, data) = row.ok_or_else(|| PibError::CertificateNotFound {
            certificate: cert_name.clone(),
        })?;
        build_certificate(name, public_key, data)
    }

    fn certificates_of_key(&self, key_name: &Name) -> PibResult<BTreeSet<Name>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.certificate_name
            FROM certificates c JOIN keys k ON c.key_id = k.id
            WHERE k.key_name = ?1
            "#,
        )?;
        let uris = stmt
            .query_map([key_name.to_uri()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        parse_names(uris)
    }

    fn set_default_certificate_of_key(
        &mut self,
        key_name: &Name,
        cert_name: &Name,
    ) -> PibResult<()> {
        let tx = self.conn.transaction()?;

        let key_id = key_id(&tx, key_name)?.ok_or_else(|| PibError::KeyNotFound {
            key: key_name.clone(),
        })?;
        let cert_id: i64 = tx
            .query_row(
                "SELECT id FROM certificates WHERE certificate_name = ?1 AND key_id = ?2",
                params![cert_name.to_uri(), key_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| PibError::CertificateNotFound {
                certificate: cert_name.clone(),
            })?;

        tx.execute(
            "UPDATE certificates SET is_default = 0 WHERE key_id = ?1 AND is_default = 1",
            [key_id],
        )?;
        tx.execute(
            "UPDATE certificates SET is_default = 1 WHERE id = ?1",
            [cert_id],
        )?;
        tx.commit()?;

        debug!(key = %key_name, certificate = %cert_name, "Default certificate changed");
        Ok(())
    }

    fn default_certificate_of_key(&self, key_name: &Name) -> PibResult<Certificate> {
        let key_id = key_id(&self.conn, key_name)?.ok_or_else(|| PibError::KeyNotFound {
            key: key_name.clone(),
        })?;
        let row: Option<(String, Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                r#"
                SELECT certificate_name, public_key, certificate_data
                FROM certificates WHERE key_id = ?1 AND is_default = 1
                "#,
                [key_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (name, public_key, data) = row.ok_or_else(|| PibError::NoDefaultCertificate {
            key: key_name.clone(),
        })?;
        build_certificate(name, public_key, data)
    }

    fn set_tpm_locator(&mut self, locator: &str) -> PibResult<()> {
        self.conn.execute(
            "UPDATE settings SET tpm_locator = ?1 WHERE id = 1",
            [locator],
        )?;
        debug!(tpm_locator = %locator, "TPM locator set");
        Ok(())
    }

    fn tpm_locator(&self) -> PibResult<String> {
        let locator: Option<String> = self
            .conn
            .query_row("SELECT tpm_locator FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        locator.ok_or(PibError::TpmLocatorNotSet)
    }

    fn reset(&mut self) -> PibResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM certificates;
            DELETE FROM keys;
            DELETE FROM identities;
            UPDATE settings SET default_identity_id = NULL WHERE id = 1;
            "#,
        )?;
        tx.commit()?;

        info!(path = %self.path.display(), "SQLite PIB reset");
        Ok(())
    }
}
