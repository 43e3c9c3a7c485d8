//! Opening roots and the root-level operations of a tree.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use metatree_backend::{join, Backend, BackendRegistry, ByteStream, DocumentFormat};

use crate::config::{RootConfig, CONFIG_FILENAME};
use crate::lock::{LockManager, LockPolicy};
use crate::metadata::{Metadata, MetadataStore};
use crate::{Error, IntoQuery, Location, Node, Query, QueryValue, Result, Schema};

/// Options for opening a tree.
///
/// Keys, locking and metadata format only take effect when the root is
/// initialized; an existing root keeps what it persisted.
#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    keys: Option<Vec<String>>,
    locking_enabled: Option<bool>,
    metadata_format: Option<DocumentFormat>,
    lock_policy: LockPolicy,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn locking(mut self, enabled: bool) -> Self {
        self.locking_enabled = Some(enabled);
        self
    }

    pub fn metadata_format(mut self, format: DocumentFormat) -> Self {
        self.metadata_format = Some(format);
        self
    }

    pub fn lock_attempts(mut self, attempts: u32) -> Self {
        self.lock_policy.attempts = attempts;
        self
    }

    pub fn lock_backoff(mut self, backoff: Duration) -> Self {
        self.lock_policy.backoff = backoff;
        self
    }

    /// Warn about every requested setting the persisted root overrides.
    fn report_overrides(&self, root: &str, config: &RootConfig) {
        if let Some(keys) = &self.keys {
            if keys != &config.keys {
                log::warn!(
                    "Ignoring keys {:?} for {}: the root was initialized with {:?}",
                    keys,
                    root,
                    config.keys
                );
            }
        }
        if let Some(enabled) = self.locking_enabled {
            if enabled != config.locking_enabled {
                log::warn!(
                    "Ignoring locking={} for {}: the root was initialized with locking={}",
                    enabled,
                    root,
                    config.locking_enabled
                );
            }
        }
        if let Some(format) = self.metadata_format {
            if format != config.metadata_format {
                log::warn!(
                    "Ignoring metadata format {} for {}: the root uses {}",
                    format,
                    root,
                    config.metadata_format
                );
            }
        }
    }
}

/// State shared by a tree handle and every node it hands out.
pub(crate) struct TreeShared {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) root: String,
    pub(crate) schema: Schema,
    pub(crate) config: RootConfig,
    pub(crate) metadata: MetadataStore,
    pub(crate) lock: LockManager,
}

/// An open tree root.
#[derive(Clone)]
pub struct Tree {
    shared: Arc<TreeShared>,
}

impl Tree {
    /// Open or initialize `root`, picking the backend from its URL scheme.
    pub fn open(root: &str, options: TreeOptions) -> Result<Self> {
        Self::open_with_registry(root, options, &BackendRegistry::with_defaults())
    }

    pub fn open_with_registry(
        root: &str,
        options: TreeOptions,
        registry: &BackendRegistry,
    ) -> Result<Self> {
        let (backend, root) = registry.open(root)?;
        Self::open_with_backend(backend, &root, options)
    }

    /// Open or initialize `root` on an explicit backend.
    ///
    /// A missing root is created and requires keys. An existing root must
    /// carry a configuration document; any other existing path is refused.
    pub fn open_with_backend(
        backend: Arc<dyn Backend>,
        root: &str,
        options: TreeOptions,
    ) -> Result<Self> {
        let root = if root.len() > 1 {
            root.trim_end_matches('/').to_string()
        } else {
            root.to_string()
        };

        let config = if !backend.exists(&root)? {
            Self::initialize(backend.as_ref(), &root, &options)?
        } else if backend.exists(&RootConfig::path(&root))? {
            let config = RootConfig::load(backend.as_ref(), &root)?;
            options.report_overrides(&root, &config);
            config
        } else {
            return Err(Error::PathAlreadyInUse { path: root });
        };

        let schema = config.schema()?;
        let metadata = MetadataStore::new(
            backend.clone(),
            config.metadata_format.metadata_filename(),
        );
        let lock = LockManager::new(
            backend.clone(),
            &root,
            config.locking_enabled,
            options.lock_policy,
        );
        log::debug!("Opened {} with keys {}", root, schema);

        Ok(Self {
            shared: Arc::new(TreeShared {
                backend,
                root,
                schema,
                config,
                metadata,
                lock,
            }),
        })
    }

    fn initialize(backend: &dyn Backend, root: &str, options: &TreeOptions) -> Result<RootConfig> {
        let keys = options.keys.as_ref().ok_or_else(|| Error::MissingSchema {
            root: root.to_string(),
        })?;
        let schema = Schema::new(keys.iter().cloned())?;
        let config = RootConfig::new(
            &schema,
            options.locking_enabled.unwrap_or(false),
            options.metadata_format.unwrap_or_default(),
        );

        backend.mkdir(root)?;
        let metadata_path = join(root, config.metadata_format.metadata_filename());
        backend.write_document(&metadata_path, Metadata::default().as_document())?;
        config.save(backend, root)?;

        log::info!("Initialized {} with keys {}", root, schema);
        Ok(config)
    }

    pub fn root_path(&self) -> &str {
        &self.shared.root
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn config(&self) -> &RootConfig {
        &self.shared.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.shared.backend
    }

    pub fn lock(&self) -> &LockManager {
        &self.shared.lock
    }

    /// The root node.
    pub fn root(&self) -> Node {
        Node::new(self.shared.clone(), Location::root())
    }

    /// Resolve `query` from the root.
    pub fn resolve<Q: IntoQuery>(&self, query: Q, create_if_missing: bool) -> Result<Node> {
        self.root().resolve(query, create_if_missing)
    }

    /// Resolve `query` from the root without creating anything.
    pub fn search<Q: IntoQuery>(&self, query: Q) -> Result<Node> {
        self.resolve(query, false)
    }

    /// Copy a local file or directory into the node `query` designates,
    /// creating missing nodes along the way.
    pub fn put<Q: IntoQuery>(&self, query: Q, source: impl AsRef<Path>) -> Result<Node> {
        self.put_with(query, source, true)
    }

    pub fn put_with<Q: IntoQuery>(
        &self,
        query: Q,
        source: impl AsRef<Path>,
        create_if_missing: bool,
    ) -> Result<Node> {
        let node = self.resolve(query, create_if_missing)?;
        let source = source.as_ref();
        if !source.exists() {
            return Err(Error::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidSegment {
                segment: source.display().to_string(),
                message: "source has no usable file name".to_string(),
            })?;
        let node_path = node.path();
        let destination = join(&node_path, name);
        if self.shared.backend.exists(&destination)? {
            return Err(Error::DestinationExists { path: destination });
        }

        let copied = self
            .shared
            .backend
            .copy_in(&node_path, source, source.is_dir())?;
        if !copied || !self.shared.backend.exists(&destination)? {
            return Err(Error::TransferIncomplete { path: destination });
        }

        log::info!("Put {} into {}", source.display(), node_path);
        Ok(node)
    }

    /// Stream an artifact addressed as `<query path>/<name>`.
    ///
    /// The final segment may be an indirection (`<key>`), resolved against
    /// the containing node's metadata.
    pub fn get(&self, path: &str) -> Result<ByteStream> {
        let source = self.locate_artifact(path)?;
        Ok(self.shared.backend.read(&source)?)
    }

    /// Copy an artifact to a local path.
    ///
    /// When `destination` is an existing directory the artifact keeps its
    /// name inside it. Bytes land in a temporary file next to the
    /// destination, which only replaces it once the whole artifact is read.
    /// Returns the written path.
    pub fn get_to(&self, path: &str, destination: impl AsRef<Path>) -> Result<PathBuf> {
        let source = self.locate_artifact(path)?;
        let mut destination = destination.as_ref().to_path_buf();
        if destination.is_dir() {
            destination.push(metatree_backend::basename(&source));
        }

        let directory = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(directory)?;
        for chunk in self.shared.backend.read(&source)? {
            staged.write_all(&chunk?)?;
        }
        staged.flush()?;
        staged
            .persist(&destination)
            .map_err(|persist| Error::Io(persist.error))?;

        if !destination.exists() {
            return Err(Error::TransferIncomplete {
                path: destination.display().to_string(),
            });
        }
        log::info!("Got {} into {}", source, destination.display());
        Ok(destination)
    }

    /// Backend path of the artifact `path` names, checked against the
    /// containing node's listing before anything is read.
    fn locate_artifact(&self, path: &str) -> Result<String> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::MalformedQuery {
                message: "an artifact path needs at least a name".to_string(),
            });
        }

        let (base, last) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        let parent = self.search(Query::parse(base, self.schema())?)?;
        let parent_path = parent.path();
        let name = QueryValue::from_segment(last)?.resolve(&parent.metadata()?, &parent_path)?;

        if !parent.list()?.contains(&name) {
            return Err(Error::ArtifactNotFound {
                name,
                parent: parent_path,
            });
        }
        Ok(join(&parent_path, &name))
    }

    /// Path of the configuration document of this root.
    pub fn config_path(&self) -> String {
        join(&self.shared.root, CONFIG_FILENAME)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.shared.root)
            .field("backend", &self.shared.backend.name())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metatree_backend::{collect_bytes, BackendError, Bytes, InMemoryBackend};
    use std::fs;

    fn tree(backend: &Arc<InMemoryBackend>) -> Tree {
        Tree::open_with_backend(
            backend.clone(),
            "/tree",
            TreeOptions::new().keys(["model", "version", "stage"]),
        )
        .unwrap()
    }

    #[test]
    fn initialization_writes_config_and_root_metadata() {
        let backend = Arc::new(InMemoryBackend::new());
        let tree = tree(&backend);

        assert!(backend.exists("/tree/.metatree").unwrap());
        assert!(backend.exists("/tree/metadata.json").unwrap());
        assert_eq!(tree.config_path(), "/tree/.metatree");
        assert!(tree.root().metadata().unwrap().is_empty());
        assert!(tree.root().list().unwrap().is_empty());
    }

    #[test]
    fn missing_keys_cannot_initialize() {
        let backend = Arc::new(InMemoryBackend::new());
        let result = Tree::open_with_backend(backend, "/tree", TreeOptions::new());
        assert!(matches!(result, Err(Error::MissingSchema { .. })));
    }

    #[test]
    fn foreign_directories_are_refused() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.mkdir("/data").unwrap();
        let result = Tree::open_with_backend(
            backend,
            "/data",
            TreeOptions::new().keys(["model"]),
        );
        assert!(matches!(result, Err(Error::PathAlreadyInUse { .. })));
    }

    #[test]
    fn trailing_slash_names_the_same_root() {
        let backend = Arc::new(InMemoryBackend::new());
        tree(&backend).resolve("m1/v1", true).unwrap();

        let reopened = Tree::open_with_backend(backend, "/tree/", TreeOptions::new()).unwrap();
        assert_eq!(reopened.root_path(), "/tree");
        assert_eq!(reopened.search("m1/v1").unwrap().path(), "/tree/m1/v1");
    }

    #[test]
    fn get_reads_through_indirection() {
        let backend = Arc::new(InMemoryBackend::new());
        let tree = tree(&backend);
        let node = tree.resolve("m1/v1/train", true).unwrap();
        backend.write("/tree/m1/v1/train/weights.bin", b"0123").unwrap();
        node.update([("best", "weights.bin")]).unwrap();

        let bytes = collect_bytes(tree.get("m1/v1/train/<best>").unwrap()).unwrap();
        assert_eq!(&bytes[..], b"0123");
    }

    #[test]
    fn get_needs_a_name() {
        let backend = Arc::new(InMemoryBackend::new());
        let tree = tree(&backend);
        assert!(matches!(
            tree.get("/"),
            Err(Error::MalformedQuery { .. })
        ));
    }

    /// Serves one chunk of every file, then fails the read.
    struct TruncatingBackend(InMemoryBackend);

    impl Backend for TruncatingBackend {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn read(&self, path: &str) -> std::result::Result<ByteStream, BackendError> {
            let mut stream = self.0.read(path)?;
            if path.ends_with(".json") {
                return Ok(stream);
            }
            let first = stream.next().unwrap_or_else(|| Ok(Bytes::new()));
            let failure = Err(BackendError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
            ));
            Ok(Box::new(vec![first, failure].into_iter()))
        }

        fn list(&self, path: &str) -> std::result::Result<Vec<String>, BackendError> {
            self.0.list(path)
        }

        fn copy_in(
            &self,
            destination_dir: &str,
            source: &Path,
            recursive: bool,
        ) -> std::result::Result<bool, BackendError> {
            self.0.copy_in(destination_dir, source, recursive)
        }

        fn mkdir(&self, path: &str) -> std::result::Result<(), BackendError> {
            self.0.mkdir(path)
        }

        fn touch(&self, path: &str) -> std::result::Result<(), BackendError> {
            self.0.touch(path)
        }

        fn unlink(&self, path: &str) -> std::result::Result<(), BackendError> {
            self.0.unlink(path)
        }

        fn exists(&self, path: &str) -> std::result::Result<bool, BackendError> {
            self.0.exists(path)
        }

        fn write(&self, path: &str, data: &[u8]) -> std::result::Result<(), BackendError> {
            self.0.write(path, data)
        }
    }

    #[test]
    fn interrupted_get_to_leaves_destination_alone() {
        let backend = Arc::new(TruncatingBackend(InMemoryBackend::new()));
        let tree = Tree::open_with_backend(
            backend.clone(),
            "/tree",
            TreeOptions::new().keys(["model"]),
        )
        .unwrap();
        tree.resolve("m1", true).unwrap();
        backend.write("/tree/m1/weights.bin", b"complete").unwrap();

        let out = tempfile::tempdir().unwrap();
        let fresh = out.path().join("fresh.bin");
        assert!(matches!(
            tree.get_to("m1/weights.bin", &fresh),
            Err(Error::Backend(_))
        ));
        assert!(!fresh.exists());

        let existing = out.path().join("existing.bin");
        fs::write(&existing, b"previous").unwrap();
        assert!(tree.get_to("m1/weights.bin", &existing).is_err());
        assert_eq!(fs::read(&existing).unwrap(), b"previous");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }
}
