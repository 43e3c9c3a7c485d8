//! Scheme-to-backend registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::path::{resolve_local_path, scheme_of};
use crate::{Backend, BackendError, HttpBackend, LocalBackend, WebHdfsBackend};

/// Builds a backend for a (normalized) root location.
pub type BackendFactory =
    Box<dyn Fn(&str) -> Result<Arc<dyn Backend>, BackendError> + Send + Sync>;

/// Maps URL schemes to backend factories.
///
/// Locations without a scheme are treated as `file`. Local roots are
/// normalized with [`resolve_local_path`] before they reach the factory.
///
/// ```rust
/// use std::sync::Arc;
/// use metatree_backend::{Backend, BackendRegistry, InMemoryBackend};
///
/// let mut registry = BackendRegistry::with_defaults();
/// let shared: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
/// registry.register("mem", move |_root: &str| Ok(shared.clone()));
///
/// let (backend, root) = registry.open("mem://scratch/").unwrap();
/// assert_eq!(backend.name(), "memory");
/// assert_eq!(root, "mem://scratch");
/// ```
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the bundled backends: `file`, `http`, `https`,
    /// `webhdfs` and `swebhdfs`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("file", |_root: &str| Ok(Arc::new(LocalBackend::new())));
        registry.register("http", |_root: &str| Ok(Arc::new(HttpBackend::new())));
        registry.register("https", |_root: &str| Ok(Arc::new(HttpBackend::new())));
        registry.register("webhdfs", |_root: &str| Ok(Arc::new(WebHdfsBackend::new())));
        registry.register("swebhdfs", |_root: &str| {
            Ok(Arc::new(WebHdfsBackend::new()))
        });
        registry
    }

    /// Register (or replace) the factory for `scheme`.
    pub fn register<F>(&mut self, scheme: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Result<Arc<dyn Backend>, BackendError> + Send + Sync + 'static,
    {
        self.factories.insert(scheme.into(), Box::new(factory));
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Pick the backend for `root` and normalize the root location.
    ///
    /// Returns the backend together with the root as the engine should use it:
    /// an absolute path for local roots, the URL without trailing slashes
    /// otherwise.
    pub fn open(&self, root: &str) -> Result<(Arc<dyn Backend>, String), BackendError> {
        let scheme = scheme_of(root).unwrap_or("file");
        let factory = self
            .factories
            .get(scheme)
            .ok_or_else(|| BackendError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })?;

        let normalized = if scheme == "file" {
            resolve_local_path(root)?.display().to_string()
        } else {
            root.trim_end_matches('/').to_string()
        };

        log::debug!("Opening {} with the {} scheme", normalized, scheme);
        Ok((factory(&normalized)?, normalized))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
