//! A tree database whose shape is fixed by an ordered key schema.
//!
//! Every level of a tree corresponds to one schema key, every node carries a
//! metadata record, and a node is only reachable when its parent declares it
//! in the reserved `children` field. Queries address nodes by key values,
//! either literally or through an indirection that reads the value from the
//! parent's metadata:
//!
//! ```rust
//! use std::sync::Arc;
//! use metatree::{Query, Tree, TreeOptions};
//! use metatree_backend::InMemoryBackend;
//!
//! let tree = Tree::open_with_backend(
//!     Arc::new(InMemoryBackend::new()),
//!     "/models",
//!     TreeOptions::new().keys(["model", "version", "stage"]),
//! ).unwrap();
//!
//! tree.resolve("m1/v1/train", true).unwrap();
//! tree.search("m1").unwrap().update([("active", "v1")]).unwrap();
//!
//! let active = tree.search(Query::new().literal("model", "m1").metadata("version", "active")).unwrap();
//! assert_eq!(active.path(), "/models/m1/v1");
//! assert_eq!(tree.search("m1/<active>/train").unwrap(), tree.search("m1/v1/train").unwrap());
//! ```
//!
//! Storage is abstracted by [`metatree_backend::Backend`]; roots are opened
//! by URL (`/local/path`, `file://`, `http(s)://`, `webhdfs://`).

mod config;
mod error;
mod location;
mod lock;
mod metadata;
mod node;
mod query;
mod resolve;
mod schema;
mod tree;

pub use config::{RootConfig, CONFIG_FILENAME};
pub use error::{Error, Result};
pub use location::Location;
pub use lock::{LockManager, LockPolicy, DEFAULT_LOCK_ATTEMPTS, DEFAULT_LOCK_BACKOFF, LOCK_FILENAME};
pub use metadata::{Metadata, CHILDREN_KEY};
pub use node::Node;
pub use query::{IntoQuery, Query, QueryValue};
pub use schema::Schema;
pub use tree::{Tree, TreeOptions};

pub use metatree_backend;
