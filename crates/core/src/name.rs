//! Hierarchical names for identities, keys and certificates.
//!
//! A [`Name`] is an ordered sequence of opaque [`Component`]s. Names are
//! written in URI form (`/alice/KEY/1`) with every component
//! percent-encoded except the unreserved characters `A-Z a-z 0-9 - . _ ~`.
//!
//! # Ordering
//!
//! Components use canonical order: a shorter component sorts before a
//! longer one, and components of equal length compare bytewise. Names
//! compare component by component, and a proper prefix sorts before any of
//! its extensions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A single name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Component(Vec<u8>);

impl Component {
    /// Create a component from raw bytes.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    /// Raw component bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse one URI-encoded component (without any `/`).
    pub fn from_escaped(escaped: &str) -> Result<Self> {
        if escaped.bytes().all(|b| b == b'.') {
            if escaped.len() < 3 {
                return Err(CoreError::MalformedName(format!(
                    "component '{}' is not allowed",
                    escaped
                )));
            }
            return Ok(Self(vec![b'.'; escaped.len() - 3]));
        }

        let bytes = escaped.as_bytes();
        let mut value = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| {
                        CoreError::MalformedName(format!("bad escape in '{}'", escaped))
                    })?;
                value.push(hex);
                i += 3;
            } else {
                value.push(bytes[i]);
                i += 1;
            }
        }
        Ok(Self(value))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|&b| b == b'.') {
            // "..." is the empty component, "...." is ".", and so on
            return write!(f, "...{}", ".".repeat(self.0.len()));
        }
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for Component {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Component {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<u64> for Component {
    fn from(value: u64) -> Self {
        Self(value.to_string().into_bytes())
    }
}

/// A hierarchical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(Vec<Component>);

impl Name {
    /// The empty name (`/`).
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a name from components.
    pub fn from_components<I, C>(components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Component>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }

    /// Append a component, returning the extended name.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.0.push(component.into());
        self
    }

    /// Push a component in place.
    pub fn push(&mut self, component: impl Into<Component>) {
        self.0.push(component.into());
    }

    /// The first `n` components (the whole name if `n >= len`).
    pub fn prefix(&self, n: usize) -> Name {
        Self(self.0[..n.min(self.0.len())].to_vec())
    }

    /// True if every component of `self` leads `other`.
    ///
    /// A name is a prefix of itself; see [`Name::is_strict_prefix_of`].
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    /// True if `self` is a prefix of `other` and shorter than it.
    pub fn is_strict_prefix_of(&self, other: &Name) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Canonical URI form.
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = CoreError;

    fn from_str(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let path = trimmed.strip_prefix('/').unwrap_or(trimmed);
        if path.is_empty() {
            return Ok(Name::new());
        }
        // a single trailing slash is tolerated
        let path = path.strip_suffix('/').unwrap_or(path);
        path.split('/')
            .map(Component::from_escaped)
            .collect::<Result<Vec<_>>>()
            .map(Name)
    }
}

impl TryFrom<String> for Name {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_uri()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let n = name("/alice/KEY/1");
        assert_eq!(n.len(), 3);
        assert_eq!(n.get(1), Some(&Component::from("KEY")));
        assert_eq!(n.to_uri(), "/alice/KEY/1");

        assert!(name("/").is_empty());
        assert!(name("").is_empty());
        assert_eq!(name("alice/bob/").to_uri(), "/alice/bob");
    }

    #[test]
    fn test_escaping() {
        let n = Name::from_components([Component::new(b"a b/c".to_vec())]);
        assert_eq!(n.to_uri(), "/a%20b%2Fc");
        assert_eq!(name("/a%20b%2Fc"), n);

        let dots = Name::from_components([Component::new(Vec::new()), Component::from(".")]);
        assert_eq!(dots.to_uri(), "/.../....");
        assert_eq!(name("/.../...."), dots);
    }

    #[test]
    fn test_malformed_uri() {
        assert!("/a/%zz".parse::<Name>().is_err());
        assert!("/a/%4".parse::<Name>().is_err());
        assert!("/a/../b".parse::<Name>().is_err());
    }

    #[test]
    fn test_prefix() {
        let id = name("/alice");
        let key = name("/alice/KEY/1");
        assert!(id.is_prefix_of(&key));
        assert!(id.is_strict_prefix_of(&key));
        assert!(key.is_prefix_of(&key));
        assert!(!key.is_strict_prefix_of(&key));
        assert!(!name("/bob").is_prefix_of(&key));
        assert_eq!(key.prefix(1), id);
        assert_eq!(key.prefix(10), key);
    }

    #[test]
    fn test_canonical_order() {
        // shorter component first, regardless of bytes
        assert!(name("/z") < name("/aa"));
        assert!(name("/a") < name("/b"));
        // prefix before extension
        assert!(name("/a") < name("/a/b"));
        assert!(Name::new() < name("/a"));
    }

    #[test]
    fn test_serde_as_uri() {
        let n = name("/alice/KEY/1");
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"/alice/KEY/1\"");
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
