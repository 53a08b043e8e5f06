//! Core types for the AetherCore public-key information base (PIB).
//!
//! This crate provides the name model shared by every PIB backend and by
//! the tools built on top of them: hierarchical [`Name`]s, the naming
//! conventions that tie keys and certificates to their owners, the
//! [`Certificate`] record, and logging setup.

pub mod certificate;
pub mod error;
pub mod logging;
pub mod name;
pub mod naming;

pub use certificate::Certificate;
pub use error::{CoreError, Result};
pub use logging::{LogFormat, LoggingConfig};
pub use name::{Component, Name};
