//! Cache key definitions

use std::fmt;

/// One ordered parameter of a [`QueryKey`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// Absent parameter (an unset id, a missing year)
    Null,
    Int(i64),
    Str(String),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Str(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeyPart::Null)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => f.write_str("null"),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::Str(s) => f.write_str(s),
        }
    }
}

/// Structured cache key: a discriminator plus ordered parameters
///
/// Two keys are the same cache identity iff they are structurally equal.
/// A key with fewer parameters acts as a prefix for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    discriminator: String,
    params: Vec<KeyPart>,
}

impl QueryKey {
    /// Create a key with no parameters (also the prefix of its whole family)
    pub fn new(discriminator: impl Into<String>) -> Self {
        Self {
            discriminator: discriminator.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.params.push(part.into());
        self
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn params(&self) -> &[KeyPart] {
        &self.params
    }

    /// True if `prefix` has the same discriminator and its parameters are a
    /// leading run of this key's parameters
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.discriminator == prefix.discriminator && self.params.starts_with(&prefix.params)
    }

    /// Flat string form: `discriminator:p1:p2`
    pub fn to_storage_key(&self) -> String {
        let mut key = self.discriminator.clone();
        for part in &self.params {
            key.push(':');
            key.push_str(&part.to_string());
        }
        key
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let key1 = QueryKey::new("literature").with("crispr").with(1900).with(2024);
        let key2 = QueryKey::new("literature").with("crispr".to_string()).with(1900i64).with(2024);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_parameter_order_matters() {
        let key1 = QueryKey::new("k").with(1).with(2);
        let key2 = QueryKey::new("k").with(2).with(1);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_prefix_matching() {
        let family = QueryKey::new("profile");
        let key = QueryKey::new("profile").with("u1");
        assert!(key.starts_with(&family));
        assert!(key.starts_with(&key));
        assert!(!family.starts_with(&key));
        assert!(!QueryKey::new("profile-x").with("u1").starts_with(&family));
    }

    #[test]
    fn test_none_is_null_part() {
        let key = QueryKey::new("literature-detail").with(None::<&str>);
        assert_eq!(key.params(), &[KeyPart::Null]);
        assert_eq!(key.to_storage_key(), "literature-detail:null");
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new("literature").with("gene drive").with(1950).with(2020);
        assert_eq!(format!("{}", key), "literature:gene drive:1950:2020");
    }
}
