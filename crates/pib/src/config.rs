//! Configuration for processes embedding a PIB.
//!
//! ```toml
//! locator = "pib-sqlite3:/var/lib/aethercore/pib"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use aethercore_core::LoggingConfig;
use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;

use crate::locator::PibLocator;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PibConfig {
    /// Backend to open
    pub locator: PibLocator,
    pub logging: LoggingConfig,
}

impl PibConfig {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    /// In-memory store with default logging, for tests and tools that must
    /// not touch disk.
    pub fn memory() -> Self {
        Self {
            locator: PibLocator::Memory,
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(all(test, feature = "toml"))]
mod tests {
    use super::*;
    use aethercore_core::LogFormat;
    use std::path::PathBuf;

    #[test]
    fn test_full_config() {
        let config = PibConfig::from_toml_str(
            r#"
            locator = "pib-sqlite3:/var/lib/pib"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.locator,
            PibLocator::Sqlite(Some(PathBuf::from("/var/lib/pib")))
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PibConfig::from_toml_str("").unwrap();
        assert_eq!(config, PibConfig::default());
        assert_eq!(config.locator, PibLocator::Sqlite(None));
    }

    #[test]
    fn test_bad_locator_rejected() {
        assert!(PibConfig::from_toml_str(r#"locator = "tpm-file:""#).is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("pib_config_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "locator = \"pib-memory:\"\n").unwrap();

        let config = PibConfig::from_file(&path).unwrap();
        assert_eq!(config, PibConfig::memory());

        std::fs::remove_file(path).ok();
    }
}
