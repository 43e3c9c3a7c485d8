//! Local disk backend.

use std::fs::{self, OpenOptions};
use std::path::{self, PathBuf};

use crate::path::join;
use crate::stream::{ReadChunks, DEFAULT_CHUNK_SIZE};
use crate::{Backend, BackendError, ByteStream};

/// Backend over the local filesystem.
///
/// Accepts both bare paths and `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    chunk_size: usize,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn file_path(path: &str) -> PathBuf {
        PathBuf::from(path.strip_prefix("file://").unwrap_or(path))
    }

    fn copy_tree(source: &path::Path, destination: &path::Path) -> Result<(), BackendError> {
        for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(|error| BackendError::Io {
                path: source.display().to_string(),
                source: error.into(),
            })?;
            let relative = entry.path().strip_prefix(source).map_err(|e| {
                BackendError::InvalidPath {
                    message: format!("walked outside of {}: {}", source.display(), e),
                }
            })?;
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| BackendError::io(target.display().to_string(), e))?;
            } else {
                fs::copy(entry.path(), &target)
                    .map_err(|e| BackendError::io(target.display().to_string(), e))?;
            }
        }
        Ok(())
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn read(&self, path: &str) -> Result<ByteStream, BackendError> {
        let file_path = Self::file_path(path);
        log::debug!("Reading {}...", file_path.display());
        let file = fs::File::open(&file_path).map_err(|e| BackendError::io(path, e))?;
        Ok(Box::new(ReadChunks::new(file, path, self.chunk_size)))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let dir = fs::read_dir(Self::file_path(path)).map_err(|e| BackendError::io(path, e))?;
        let mut names = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| BackendError::io(path, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn copy_in(
        &self,
        destination_dir: &str,
        source: &path::Path,
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
        let target = Self::file_path(&destination);
        log::debug!("Copying {} to {}", source.display(), target.display());

        if source.is_dir() {
            if !recursive {
                return Err(BackendError::InvalidPath {
                    message: format!(
                        "{} is a directory; a recursive copy is required",
                        source.display()
                    ),
                });
            }
            Self::copy_tree(source, &target)?;
        } else {
            fs::copy(source, &target).map_err(|e| BackendError::io(destination.clone(), e))?;
        }

        self.exists(&destination)
    }

    fn mkdir(&self, path: &str) -> Result<(), BackendError> {
        log::debug!("Creating directory {}", path);
        fs::create_dir_all(Self::file_path(path)).map_err(|e| BackendError::io(path, e))
    }

    fn touch(&self, path: &str) -> Result<(), BackendError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::file_path(path))
            .map(|_| ())
            .map_err(|e| BackendError::io(path, e))
    }

    fn unlink(&self, path: &str) -> Result<(), BackendError> {
        fs::remove_file(Self::file_path(path)).map_err(|e| BackendError::io(path, e))
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        Self::file_path(path)
            .try_exists()
            .map_err(|e| BackendError::io(path, e))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
        log::debug!("Writing {}...", path);
        fs::write(Self::file_path(path), data).map_err(|e| BackendError::io(path, e))
    }
}
