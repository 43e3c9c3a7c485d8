//! # metatree-backend
//!
//! Storage backends for Metatree.
//!
//! A backend is the thin layer between the tree engine and a physical medium.
//! It exposes byte-stream reads, non-recursive listings, create/delete/exists
//! checks for files and directories, and whole-document reads/writes for the
//! small JSON/YAML records the engine keeps next to every node.
//!
//! ## Backends
//!
//! - [`LocalBackend`]: local disk, bare paths and `file://` URLs
//! - [`HttpBackend`]: read-only trees served over `http://` / `https://`
//! - [`WebHdfsBackend`]: HDFS through the WebHDFS REST API (`webhdfs://`)
//! - [`InMemoryBackend`]: process-local tree, mostly useful in tests
//!
//! Backends are picked by URL scheme through a [`BackendRegistry`]:
//!
//! ```rust
//! use metatree_backend::BackendRegistry;
//!
//! let registry = BackendRegistry::with_defaults();
//! let (backend, root) = registry.open("/tmp/metatree").unwrap();
//! assert_eq!(root, "/tmp/metatree");
//! assert_eq!(backend.name(), "local");
//! ```

pub use bytes::Bytes;

pub mod document;
pub mod error;
pub mod http;
pub mod in_memory;
pub mod local;
pub mod path;
pub mod registry;
pub mod stream;
mod traits;
pub mod webhdfs;

pub use document::{Document, DocumentFormat};
pub use error::BackendError;
pub use http::HttpBackend;
pub use in_memory::InMemoryBackend;
pub use local::LocalBackend;
pub use path::{basename, join, resolve_file_url, resolve_local_path, scheme_of};
pub use registry::{BackendFactory, BackendRegistry};
pub use stream::{collect_bytes, ByteStream, ReadChunks, DEFAULT_CHUNK_SIZE};
pub use traits::Backend;
pub use webhdfs::WebHdfsBackend;
