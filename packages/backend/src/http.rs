//! Read-only backend for trees served over HTTP.

use std::path::Path;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use url::Url;

use crate::stream::{ReadChunks, DEFAULT_CHUNK_SIZE};
use crate::{Backend, BackendError, ByteStream};

/// A backend over a plain HTTP file server.
///
/// The server is expected to:
/// - serve files on `GET`,
/// - answer `GET` on a directory with a JSON array of entry names,
/// - answer `HEAD` with `404` for missing entries.
///
/// Every mutation fails with [`BackendError::Unsupported`]; HTTP trees are
/// published elsewhere and consumed read-only.
pub struct HttpBackend {
    client: Client,
    chunk_size: usize,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a backend with a custom reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn url(path: &str) -> Result<Url, BackendError> {
        Ok(Url::parse(path)?)
    }

    fn check(response: Response, path: &str) -> Result<Response, BackendError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                status: status.as_u16(),
                url: path.to_string(),
            });
        }
        Ok(response)
    }

    fn unsupported(operation: &'static str) -> BackendError {
        BackendError::Unsupported {
            backend: "http",
            operation,
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn read(&self, path: &str) -> Result<ByteStream, BackendError> {
        log::debug!("GET {}", path);
        let response = self.client.get(Self::url(path)?).send()?;
        let response = Self::check(response, path)?;
        Ok(Box::new(ReadChunks::new(response, path, self.chunk_size)))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let listing_url = format!("{}/", path.trim_end_matches('/'));
        log::debug!("GET {}", listing_url);
        let response = self.client.get(Self::url(&listing_url)?).send()?;
        let mut names: Vec<String> = Self::check(response, path)?.json()?;
        names.sort();
        Ok(names)
    }

    fn copy_in(
        &self,
        _destination_dir: &str,
        _source: &Path,
        _recursive: bool,
    ) -> Result<bool, BackendError> {
        Err(Self::unsupported("copy_in"))
    }

    fn mkdir(&self, _path: &str) -> Result<(), BackendError> {
        Err(Self::unsupported("mkdir"))
    }

    fn touch(&self, _path: &str) -> Result<(), BackendError> {
        Err(Self::unsupported("touch"))
    }

    fn unlink(&self, _path: &str) -> Result<(), BackendError> {
        Err(Self::unsupported("unlink"))
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        let response = self.client.head(Self::url(path)?).send()?;
        match Self::check(response, path) {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn write(&self, _path: &str, _data: &[u8]) -> Result<(), BackendError> {
        Err(Self::unsupported("write"))
    }
}
