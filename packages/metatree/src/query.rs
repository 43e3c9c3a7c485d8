//! Location queries: structured and string notations.
//!
//! A query assigns schema keys either a literal value or an *indirection*, a
//! metadata key whose value is looked up on the node being descended from.
//!
//! String form: `"m1/<active>/train"` assigns segments to schema keys by
//! position; `<name>` is an indirection on metadata key `name`.
//!
//! Structured form (JSON):
//!
//! ```json
//! {"model": "m1", "version": {"metadata": "active"}, "stage": {"value": "train"}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::{Error, Metadata, Result, Schema};

/// Value assigned to one key of a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryValue {
    /// Use the value as-is.
    Literal(String),
    /// Read the value from the named field of the current node's metadata.
    Metadata(String),
}

impl QueryValue {
    pub fn literal(value: impl Into<String>) -> Self {
        QueryValue::Literal(value.into())
    }

    pub fn metadata(key: impl Into<String>) -> Self {
        QueryValue::Metadata(key.into())
    }

    /// Parse one string-form segment: `<name>` or a literal.
    pub fn from_segment(segment: &str) -> Result<Self> {
        if segment.is_empty() {
            return Err(Error::MalformedQuery {
                message: "empty path segment".to_string(),
            });
        }
        match segment
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Some("") => Err(Error::MalformedQuery {
                message: "empty metadata reference '<>'".to_string(),
            }),
            Some(name) => Ok(QueryValue::Metadata(name.to_string())),
            None => Ok(QueryValue::Literal(segment.to_string())),
        }
    }

    /// Parse one structured-form value.
    ///
    /// Accepts a bare string or number, `{"value": v}` or `{"metadata": m}`.
    pub fn from_json(key: &str, spec: &JsonValue) -> Result<Self> {
        let invalid = || Error::InvalidChildSpec {
            key: key.to_string(),
            spec: spec.to_string(),
        };

        match spec {
            JsonValue::String(s) => Ok(QueryValue::Literal(s.clone())),
            JsonValue::Number(n) => Ok(QueryValue::Literal(n.to_string())),
            JsonValue::Object(map) => {
                if let Some(value) = map.get("value") {
                    match value {
                        JsonValue::String(s) => Ok(QueryValue::Literal(s.clone())),
                        JsonValue::Number(n) => Ok(QueryValue::Literal(n.to_string())),
                        _ => Err(invalid()),
                    }
                } else if let Some(JsonValue::String(name)) = map.get("metadata") {
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    Ok(QueryValue::Metadata(name.clone()))
                } else {
                    Err(invalid())
                }
            }
            _ => Err(invalid()),
        }
    }

    /// Resolve against the metadata of the node at `node_path`.
    pub fn resolve(&self, metadata: &Metadata, node_path: &str) -> Result<String> {
        let value = match self {
            QueryValue::Literal(value) => value.clone(),
            QueryValue::Metadata(key) => {
                metadata
                    .get_string(key)
                    .ok_or_else(|| Error::MetadataKeyNotFound {
                        key: key.clone(),
                        path: node_path.to_string(),
                    })?
            }
        };
        validate_segment(&value)?;
        Ok(value)
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Literal(value) => write!(f, "{}", value),
            QueryValue::Metadata(key) => write!(f, "<{}>", key),
        }
    }
}

/// A literal must be usable as a single path segment.
pub(crate) fn validate_segment(segment: &str) -> Result<()> {
    let message = if segment.is_empty() {
        "segments cannot be empty"
    } else if segment == "." || segment == ".." {
        "relative segments are not allowed"
    } else if segment.contains('/') {
        "segments cannot contain '/'"
    } else {
        return Ok(());
    };
    Err(Error::InvalidSegment {
        segment: segment.to_string(),
        message: message.to_string(),
    })
}

/// A canonical query: key → value. Key order carries no meaning; traversal
/// always follows the schema.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    values: BTreeMap<String, QueryValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), QueryValue::literal(value));
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, metadata_key: impl Into<String>) -> Self {
        self.values
            .insert(key.into(), QueryValue::metadata(metadata_key));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) -> Option<QueryValue> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse the string notation against `schema`.
    ///
    /// ```rust
    /// use metatree::{Query, QueryValue, Schema};
    ///
    /// let schema = Schema::new(["model", "version", "stage"]).unwrap();
    /// let query = Query::parse("/m1/<active>/", &schema).unwrap();
    /// assert_eq!(query.get("model"), Some(&QueryValue::literal("m1")));
    /// assert_eq!(query.get("version"), Some(&QueryValue::metadata("active")));
    /// assert_eq!(query.get("stage"), None);
    /// ```
    pub fn parse(query: &str, schema: &Schema) -> Result<Self> {
        let trimmed = query.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::new());
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() > schema.len() {
            return Err(Error::MalformedQuery {
                message: format!(
                    "'{}' has {} segments but the schema {} has only {} keys",
                    query,
                    segments.len(),
                    schema,
                    schema.len()
                ),
            });
        }

        segments
            .into_iter()
            .zip(schema.iter())
            .map(|(segment, key)| -> Result<(String, QueryValue)> {
                Ok((key.to_string(), QueryValue::from_segment(segment)?))
            })
            .collect()
    }

    /// Parse the structured notation. `null` values leave a key unset.
    pub fn from_json(query: &JsonValue) -> Result<Self> {
        let map = query.as_object().ok_or_else(|| Error::InvalidChildSpec {
            key: String::new(),
            spec: query.to_string(),
        })?;

        map.iter()
            .filter(|(_, spec)| !spec.is_null())
            .map(|(key, spec)| -> Result<(String, QueryValue)> {
                Ok((key.clone(), QueryValue::from_json(key, spec)?))
            })
            .collect()
    }

    /// Every key must belong to the schema.
    pub(crate) fn check_keys(&self, schema: &Schema) -> Result<()> {
        match self.values.keys().find(|key| !schema.contains(key)) {
            Some(key) => Err(Error::MalformedQuery {
                message: format!("'{}' is not a key of the schema {}", key, schema),
            }),
            None => Ok(()),
        }
    }
}

impl FromIterator<(String, QueryValue)> for Query {
    fn from_iter<T: IntoIterator<Item = (String, QueryValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Anything that can be turned into a [`Query`] once the schema is known.
pub trait IntoQuery {
    fn into_query(self, schema: &Schema) -> Result<Query>;
}

impl IntoQuery for Query {
    fn into_query(self, _schema: &Schema) -> Result<Query> {
        Ok(self)
    }
}

impl IntoQuery for &Query {
    fn into_query(self, _schema: &Schema) -> Result<Query> {
        Ok(self.clone())
    }
}

impl IntoQuery for &str {
    fn into_query(self, schema: &Schema) -> Result<Query> {
        Query::parse(self, schema)
    }
}

impl IntoQuery for &String {
    fn into_query(self, schema: &Schema) -> Result<Query> {
        Query::parse(self, schema)
    }
}

impl IntoQuery for String {
    fn into_query(self, schema: &Schema) -> Result<Query> {
        Query::parse(&self, schema)
    }
}

impl IntoQuery for &JsonValue {
    fn into_query(self, _schema: &Schema) -> Result<Query> {
        Query::from_json(self)
    }
}

impl IntoQuery for JsonValue {
    fn into_query(self, _schema: &Schema) -> Result<Query> {
        Query::from_json(&self)
    }
}
