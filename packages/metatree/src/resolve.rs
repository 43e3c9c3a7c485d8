//! Schema-driven descent from a node to the node a query designates.

use crate::metadata::Metadata;
use crate::{Error, Node, Query, Result};

/// Walk `query` down from `node`.
///
/// One schema key is consumed per level: the first key not yet set in the
/// node's location. Its query value is resolved (literals as-is,
/// indirections against the current node's metadata), the child must exist
/// and must be declared in the current node's `children`. With
/// `create_if_missing`, a missing child is created and registered first.
///
/// Queries that stop early return an internal node. Key order inside the
/// query is irrelevant; only the schema orders the walk.
pub(crate) fn resolve(node: &Node, query: &Query, create_if_missing: bool) -> Result<Node> {
    query.check_keys(node.schema())?;
    descend(node.clone(), query, create_if_missing)
}

fn descend(node: Node, query: &Query, create_if_missing: bool) -> Result<Node> {
    let schema = node.schema();
    let depth = node.depth();

    let Some(key) = schema.get(depth) else {
        return Ok(node);
    };

    let Some(value) = query.get(key) else {
        // A location covers a prefix of the schema; later keys cannot be set
        // while this one is missing.
        if let Some(later) = schema
            .iter()
            .skip(depth + 1)
            .find(|later| query.get(later).is_some())
        {
            return Err(Error::MalformedQuery {
                message: format!("'{}' is set but '{}' is not", later, key),
            });
        }
        return Ok(node);
    };

    let parent_path = node.path();
    let mut declared = node.metadata()?;
    let child = value.resolve(&declared, &parent_path)?;
    let candidate = node.child(key, &child);
    let candidate_path = candidate.path();
    let backend = node.backend();

    if create_if_missing && !backend.exists(&candidate_path)? {
        create_child(&node, &candidate, &child)?;
        declared = node.metadata()?;
    }

    if !backend.exists(&candidate_path)? {
        return Err(Error::NodeNotFound {
            path: candidate_path,
        });
    }

    if !declared.has_child(&child) {
        return Err(Error::UnlinkedChild {
            child,
            parent: parent_path,
        });
    }

    descend(candidate, query, create_if_missing)
}

/// Register `candidate` in its parent's children and materialize it.
///
/// Nothing is touched unless the lock is held. The child is declared before
/// its directory exists, so an interrupted creation leaves a declared but
/// missing node that the next creating call completes.
fn create_child(parent: &Node, candidate: &Node, child: &str) -> Result<()> {
    let parent_path = parent.path();
    let candidate_path = candidate.path();
    let metadata = parent.metadata_store();
    let backend = parent.backend();

    parent.lock().with_lock(|| {
        if backend.exists(&candidate_path)? {
            return Ok(());
        }

        log::debug!("Creating node {}", candidate_path);
        let registered = metadata.read(&parent_path)?.with_child(child);
        metadata.write(&parent_path, &registered)?;
        backend.mkdir(&candidate_path)?;
        metadata.write(&candidate_path, &Metadata::default())
    })
}
