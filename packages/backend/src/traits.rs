//! The storage backend contract consumed by the tree engine.

use std::path::Path;

use crate::stream::collect_bytes;
use crate::{BackendError, ByteStream, Document, DocumentFormat};

/// A physical medium a tree can live on.
///
/// Paths are full backend locations (`/srv/tree/m1`, `http://host/tree/m1`,
/// `webhdfs://nn:9870/tree/m1`), already joined by the caller.
///
/// # Object Safety
///
/// This trait is object-safe: the engine holds an `Arc<dyn Backend>`.
pub trait Backend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Open a file as a lazy stream of chunks.
    ///
    /// A missing file is reported as [`BackendError::NotFound`].
    fn read(&self, path: &str) -> Result<ByteStream, BackendError>;

    /// Entry names of a directory, non-recursive.
    fn list(&self, path: &str) -> Result<Vec<String>, BackendError>;

    /// Copy the local `source` into `destination_dir`, keeping its file name.
    ///
    /// Returns whether the copied entry exists afterwards.
    fn copy_in(
        &self,
        destination_dir: &str,
        source: &Path,
        recursive: bool,
    ) -> Result<bool, BackendError>;

    /// Create a directory and any missing parents. Existing directories are fine.
    fn mkdir(&self, path: &str) -> Result<(), BackendError>;

    /// Create an empty file if it does not exist yet.
    fn touch(&self, path: &str) -> Result<(), BackendError>;

    /// Remove a file.
    fn unlink(&self, path: &str) -> Result<(), BackendError>;

    fn exists(&self, path: &str) -> Result<bool, BackendError>;

    /// Overwrite a file with `data`.
    fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError>;

    /// Read a whole document.
    ///
    /// A missing or malformed document is an empty document, not an error.
    /// Every other failure propagates.
    fn read_document(&self, path: &str) -> Result<Document, BackendError> {
        let stream = match self.read(path) {
            Ok(stream) => stream,
            Err(error) if error.is_not_found() => return Ok(Document::new()),
            Err(error) => return Err(error),
        };

        let bytes = collect_bytes(stream)?;
        match DocumentFormat::from_path(path).decode(&bytes) {
            Ok(document) => Ok(document),
            Err(error) if error.is_malformed_document() => {
                if !bytes.is_empty() {
                    log::warn!("Ignoring malformed document {}: {}", path, error);
                }
                Ok(Document::new())
            }
            Err(error) => Err(error),
        }
    }

    /// Overwrite a whole document.
    fn write_document(&self, path: &str, document: &Document) -> Result<(), BackendError> {
        let bytes = DocumentFormat::from_path(path).encode(document)?;
        log::debug!("Writing document {} ({} bytes)", path, bytes.len());
        self.write(path, &bytes)
    }
}
