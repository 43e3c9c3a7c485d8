//! Process-local backend.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::path::join;
use crate::stream::{ReadChunks, DEFAULT_CHUNK_SIZE};
use crate::{Backend, BackendError, ByteStream};

#[derive(Debug, Clone)]
enum Entry {
    Dir,
    File(Vec<u8>),
}

/// A backend that keeps the whole tree in memory.
///
/// Useful for tests and for embedding a throwaway tree. It also counts file
/// reads so callers can assert that an operation did not touch file contents.
///
/// # Example
///
/// ```rust
/// use metatree_backend::{Backend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.mkdir("/tree/a").unwrap();
/// backend.write("/tree/a/x", b"hi").unwrap();
/// assert_eq!(backend.list("/tree/a").unwrap(), vec!["x"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: Mutex<BTreeMap<String, Entry>>,
    reads: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful [`Backend::read`] calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn key(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert_dir_all(entries: &mut BTreeMap<String, Entry>, path: &str) {
        let mut current = path;
        loop {
            entries
                .entry(current.to_string())
                .or_insert(Entry::Dir);
            match current.rfind('/') {
                Some(idx) => {
                    let parent = &current[..idx];
                    if parent.is_empty() || parent.ends_with('/') || parent.ends_with(':') {
                        break;
                    }
                    current = parent;
                }
                None => break,
            }
        }
    }

    fn insert_file(&self, path: &str, data: Vec<u8>) {
        self.entries().insert(Self::key(path), Entry::File(data));
    }
}

impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, path: &str) -> Result<ByteStream, BackendError> {
        let data = match self.entries().get(&Self::key(path)) {
            Some(Entry::File(data)) => data.clone(),
            Some(Entry::Dir) => {
                return Err(BackendError::InvalidPath {
                    message: format!("{} is a directory", path),
                })
            }
            None => {
                return Err(BackendError::NotFound {
                    path: path.to_string(),
                })
            }
        };
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ReadChunks::new(
            Cursor::new(data),
            path,
            DEFAULT_CHUNK_SIZE,
        )))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let key = Self::key(path);
        let entries = self.entries();
        match entries.get(&key) {
            Some(Entry::Dir) => {}
            _ => {
                return Err(BackendError::NotFound {
                    path: path.to_string(),
                })
            }
        }

        let prefix = if key.ends_with('/') {
            key
        } else {
            format!("{}/", key)
        };
        Ok(entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(name, _)| &name[prefix.len()..])
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn copy_in(
        &self,
        destination_dir: &str,
        source: &Path,
        recursive: bool,
    ) -> Result<bool, BackendError> {
        let name = source
            .file_name()
            .ok_or_else(|| BackendError::InvalidPath {
                message: format!("source {} has no file name", source.display()),
            })?
            .to_string_lossy()
            .into_owned();
        let destination = join(destination_dir, &name);

        if source.is_dir() {
            if !recursive {
                return Err(BackendError::InvalidPath {
                    message: format!(
                        "{} is a directory; a recursive copy is required",
                        source.display()
                    ),
                });
            }
            for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
                let entry = entry.map_err(|error| BackendError::Io {
                    path: source.display().to_string(),
                    source: error.into(),
                })?;
                let relative = entry
                    .path()
                    .strip_prefix(source)
                    .map_err(|e| BackendError::InvalidPath {
                        message: e.to_string(),
                    })?
                    .to_string_lossy()
                    .into_owned();
                let target = if relative.is_empty() {
                    destination.clone()
                } else {
                    join(&destination, &relative)
                };
                if entry.file_type().is_dir() {
                    self.mkdir(&target)?;
                } else {
                    let data = fs::read(entry.path())
                        .map_err(|e| BackendError::io(entry.path().display().to_string(), e))?;
                    self.insert_file(&target, data);
                }
            }
        } else {
            let data =
                fs::read(source).map_err(|e| BackendError::io(source.display().to_string(), e))?;
            self.insert_file(&destination, data);
        }

        self.exists(&destination)
    }

    fn mkdir(&self, path: &str) -> Result<(), BackendError> {
        let key = Self::key(path);
        let mut entries = self.entries();
        if let Some(Entry::File(_)) = entries.get(&key) {
            return Err(BackendError::InvalidPath {
                message: format!("{} is a file", path),
            });
        }
        Self::insert_dir_all(&mut entries, &key);
        Ok(())
    }

    fn touch(&self, path: &str) -> Result<(), BackendError> {
        self.entries()
            .entry(Self::key(path))
            .or_insert_with(|| Entry::File(Vec::new()));
        Ok(())
    }

    fn unlink(&self, path: &str) -> Result<(), BackendError> {
        let key = Self::key(path);
        let mut entries = self.entries();
        match entries.get(&key) {
            Some(Entry::File(_)) => {
                entries.remove(&key);
                Ok(())
            }
            Some(Entry::Dir) => Err(BackendError::InvalidPath {
                message: format!("{} is a directory", path),
            }),
            None => Err(BackendError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        Ok(self.entries().contains_key(&Self::key(path)))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
        self.insert_file(path, data.to_vec());
        Ok(())
    }
}
