//! Nodes of a tree and the operations on a resolved node.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use metatree_backend::Backend;

use crate::config::CONFIG_FILENAME;
use crate::lock::{LockManager, LOCK_FILENAME};
use crate::metadata::{MetadataStore, CHILDREN_KEY};
use crate::tree::TreeShared;
use crate::{resolve, Error, IntoQuery, Location, Metadata, Result, Schema};

/// A point in the tree: a root handle plus a resolved location.
///
/// Nodes are cheap to clone and can be shared between threads.
#[derive(Clone)]
pub struct Node {
    shared: Arc<TreeShared>,
    location: Location,
}

impl Node {
    pub(crate) fn new(shared: Arc<TreeShared>, location: Location) -> Self {
        Self { shared, location }
    }

    /// The node one level down, without any existence check.
    pub(crate) fn child(&self, key: &str, value: &str) -> Self {
        Self::new(self.shared.clone(), self.location.with(key, value))
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.shared.backend
    }

    pub(crate) fn lock(&self) -> &LockManager {
        &self.shared.lock
    }

    pub(crate) fn metadata_store(&self) -> &MetadataStore {
        &self.shared.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Physical backend path of the node.
    pub fn path(&self) -> String {
        self.location.path_under(&self.shared.root)
    }

    pub fn depth(&self) -> usize {
        self.location.len()
    }

    pub fn is_root(&self) -> bool {
        self.location.is_empty()
    }

    /// True when every schema key is resolved.
    pub fn is_leaf(&self) -> bool {
        self.depth() == self.schema().len()
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.shared.backend.exists(&self.path())?)
    }

    /// Fresh full read of the metadata record.
    pub fn metadata(&self) -> Result<Metadata> {
        self.shared.metadata.read(&self.path())
    }

    /// The declared children of this node.
    pub fn children(&self) -> Result<BTreeSet<String>> {
        Ok(self.metadata()?.children())
    }

    /// Entries of the node directory, without the metadata document and the
    /// root bookkeeping files.
    pub fn list(&self) -> Result<Vec<String>> {
        let metadata_filename = self.shared.metadata.filename();
        let is_root = self.is_root();
        Ok(self
            .shared
            .backend
            .list(&self.path())?
            .into_iter()
            .filter(|name| name != metadata_filename)
            .filter(|name| !(is_root && (name == CONFIG_FILENAME || name == LOCK_FILENAME)))
            .collect())
    }

    /// Merge `fields` into the metadata record and rewrite it.
    ///
    /// Values are stored as strings. The reserved `children` key is rejected
    /// before anything is written. Returns the record as written.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use metatree::{Tree, TreeOptions};
    /// use metatree_backend::InMemoryBackend;
    ///
    /// let tree = Tree::open_with_backend(
    ///     Arc::new(InMemoryBackend::new()),
    ///     "/tree",
    ///     TreeOptions::new().keys(["model", "version"]),
    /// ).unwrap();
    /// let root = tree.root();
    /// root.update([("epochs", 12)]).unwrap();
    /// assert_eq!(root.metadata().unwrap().get_string("epochs").as_deref(), Some("12"));
    /// assert!(root.update([("children", "x")]).is_err());
    /// ```
    pub fn update<I, K, V>(&self, fields: I) -> Result<Metadata>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.to_string()))
            .collect();
        if fields.iter().any(|(key, _)| key == CHILDREN_KEY) {
            return Err(Error::ReservedKeyViolation {
                key: CHILDREN_KEY.to_string(),
            });
        }

        let path = self.path();
        self.shared.lock.with_lock(|| {
            let updated = self.shared.metadata.read(&path)?.merged(&fields);
            self.shared.metadata.write(&path, &updated)?;
            Ok(updated)
        })
    }

    /// Resolve `query` relative to this node.
    pub fn resolve<Q: IntoQuery>(&self, query: Q, create_if_missing: bool) -> Result<Node> {
        let query = query.into_query(self.schema())?;
        resolve::resolve(self, &query, create_if_missing)
    }

    /// Resolve `query` relative to this node without creating anything.
    pub fn search<Q: IntoQuery>(&self, query: Q) -> Result<Node> {
        self.resolve(query, false)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.shared.root == other.shared.root && self.location == other.location
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.path())
            .field("location", &self.location)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}
