//! The ordered key schema of a tree.

use std::collections::HashSet;
use std::fmt;

use crate::{Error, Result};

/// Ordered, distinct key names. Fixed for the lifetime of a root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Schema {
    keys: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting empty schemas, empty names and duplicates.
    ///
    /// ```rust
    /// use metatree::Schema;
    ///
    /// let schema = Schema::new(["model", "version", "stage"]).unwrap();
    /// assert_eq!(schema.len(), 3);
    /// assert_eq!(schema.position("stage"), Some(2));
    /// assert!(Schema::new(["a", "a"]).is_err());
    /// ```
    pub fn new<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::InvalidSchema {
                message: "a schema needs at least one key".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for key in &keys {
            if key.is_empty() || key.contains('/') {
                return Err(Error::InvalidSchema {
                    message: format!("'{}' is not a valid key name", key),
                });
            }
            if !seen.insert(key.as_str()) {
                return Err(Error::InvalidSchema {
                    message: format!("duplicate key '{}'", key),
                });
            }
        }

        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.keys.join(", "))
    }
}
