//! Resolved node locations.

use std::fmt;

use metatree_backend::join;

/// Literal values for a prefix of the schema, in schema order.
///
/// Locations are immutable accumulators: descending one level produces a new
/// location with one more key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    entries: Vec<(String, String)>,
}

impl Location {
    /// The root location: no key resolved.
    pub fn root() -> Self {
        Self::default()
    }

    /// A copy of this location extended by one key.
    pub(crate) fn with(&self, key: &str, value: &str) -> Self {
        let mut entries = self.entries.clone();
        entries.push((key.to_string(), value.to_string()));
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of resolved keys, i.e. the node depth.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Literal values in schema order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    /// Physical path of this location under `root`.
    pub fn path_under(&self, root: &str) -> String {
        self.values()
            .fold(root.to_string(), |path, value| join(&path, value))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
