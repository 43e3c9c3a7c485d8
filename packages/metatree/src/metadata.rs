//! Per-node metadata records.
//!
//! A record is read in full on every access and rewritten in full on every
//! mutation. There is no patching and no client-side caching: the
//! whole-record overwrite is what concurrent writers race on, and the lock
//! (see [`crate::lock`]) is what serializes them.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use metatree_backend::{Backend, Document};

use crate::Result;

/// Reserved key listing the declared children of a node.
pub const CHILDREN_KEY: &str = "children";

/// The associative metadata record of one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    fields: Document,
}

impl Metadata {
    pub fn from_document(fields: Document) -> Self {
        Self { fields }
    }

    pub fn into_document(self) -> Document {
        self.fields
    }

    pub fn as_document(&self) -> &Document {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    /// A field rendered as a string; non-string JSON values are serialized.
    /// A `null` field reads as absent.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(key.into(), JsonValue::String(value.into()));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The declared children set.
    pub fn children(&self) -> BTreeSet<String> {
        match self.fields.get(CHILDREN_KEY) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn has_child(&self, child: &str) -> bool {
        self.children().contains(child)
    }

    /// Merge `child` into the children set. Other fields are kept.
    pub fn with_child(mut self, child: &str) -> Self {
        let mut children = self.children();
        children.insert(child.to_string());
        self.fields.insert(
            CHILDREN_KEY.to_string(),
            JsonValue::Array(children.into_iter().map(JsonValue::String).collect()),
        );
        self
    }

    /// Merge stringified fields, overwriting by name and keeping the rest.
    pub(crate) fn merged(mut self, fields: &[(String, String)]) -> Self {
        for (key, value) in fields {
            self.fields
                .insert(key.clone(), JsonValue::String(value.clone()));
        }
        self
    }
}

impl From<Document> for Metadata {
    fn from(fields: Document) -> Self {
        Self::from_document(fields)
    }
}

/// Reads and writes metadata documents through the backend.
pub(crate) struct MetadataStore {
    backend: Arc<dyn Backend>,
    filename: &'static str,
}

impl MetadataStore {
    pub(crate) fn new(backend: Arc<dyn Backend>, filename: &'static str) -> Self {
        Self { backend, filename }
    }

    pub(crate) fn filename(&self) -> &'static str {
        self.filename
    }

    pub(crate) fn document_path(&self, node_path: &str) -> String {
        metatree_backend::join(node_path, self.filename)
    }

    /// Fresh full read. Missing or malformed documents read as empty.
    pub(crate) fn read(&self, node_path: &str) -> Result<Metadata> {
        let document = self.backend.read_document(&self.document_path(node_path))?;
        Ok(Metadata::from_document(document))
    }

    /// Whole-record overwrite.
    pub(crate) fn write(&self, node_path: &str, metadata: &Metadata) -> Result<()> {
        self.backend
            .write_document(&self.document_path(node_path), metadata.as_document())?;
        Ok(())
    }
}
