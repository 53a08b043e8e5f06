//! PIB locators: `<scheme>:<location>` strings naming a backend.
//!
//! | Locator | Backend |
//! |---|---|
//! | `pib-memory:` | [`PibMemory`](crate::PibMemory) |
//! | `pib-sqlite3:/var/lib/pib` | [`PibSqlite`](crate::PibSqlite) at the given location |
//! | `pib-sqlite3:` | [`PibSqlite`](crate::PibSqlite) at its default location |
//!
//! The trailing `:` may be omitted.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PibError;

/// Scheme of the in-memory backend.
pub const MEMORY_SCHEME: &str = "pib-memory";

/// Scheme of the SQLite backend.
pub const SQLITE_SCHEME: &str = "pib-sqlite3";

/// Parsed PIB locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PibLocator {
    Memory,
    /// `None` selects the default location
    Sqlite(Option<PathBuf>),
}

impl Default for PibLocator {
    fn default() -> Self {
        PibLocator::Sqlite(None)
    }
}

impl PibLocator {
    pub fn scheme(&self) -> &'static str {
        match self {
            PibLocator::Memory => MEMORY_SCHEME,
            PibLocator::Sqlite(_) => SQLITE_SCHEME,
        }
    }
}

impl fmt::Display for PibLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PibLocator::Memory => write!(f, "{}:", MEMORY_SCHEME),
            PibLocator::Sqlite(None) => write!(f, "{}:", SQLITE_SCHEME),
            PibLocator::Sqlite(Some(path)) => write!(f, "{}:{}", SQLITE_SCHEME, path.display()),
        }
    }
}

impl FromStr for PibLocator {
    type Err = PibError;

    fn from_str(locator: &str) -> Result<Self, Self::Err> {
        let locator = locator.trim();
        let (scheme, location) = locator.split_once(':').unwrap_or((locator, ""));

        match scheme {
            MEMORY_SCHEME if location.is_empty() => Ok(PibLocator::Memory),
            MEMORY_SCHEME => Err(PibError::InvalidLocator(format!(
                "{} takes no location, got '{}'",
                MEMORY_SCHEME, location
            ))),
            SQLITE_SCHEME if location.is_empty() => Ok(PibLocator::Sqlite(None)),
            SQLITE_SCHEME => Ok(PibLocator::Sqlite(Some(PathBuf::from(location)))),
            other => Err(PibError::InvalidLocator(format!(
                "unknown scheme '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for PibLocator {
    type Error = PibError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PibLocator> for String {
    fn from(locator: PibLocator) -> Self {
        locator.to_string()
    }
}
