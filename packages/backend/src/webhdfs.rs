//! HDFS backend over the WebHDFS REST API.

use std::fs;
use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::path::join;
use crate::stream::{ReadChunks, DEFAULT_CHUNK_SIZE};
use crate::{Backend, BackendError, ByteStream};

#[derive(Deserialize, Debug)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Deserialize, Debug)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<FileStatus>,
}

#[derive(Deserialize, Debug)]
struct FileStatus {
    #[serde(rename = "pathSuffix")]
    path_suffix: String,
}

#[derive(Deserialize, Debug)]
struct BooleanResponse {
    boolean: bool,
}

/// A backend speaking WebHDFS.
///
/// Locations look like `webhdfs://namenode:9870/path/in/hdfs` and are mapped
/// onto `http://namenode:9870/webhdfs/v1/path/in/hdfs?op=...`. The
/// `swebhdfs` scheme maps onto `https`.
pub struct WebHdfsBackend {
    client: Client,
    user: Option<String>,
    chunk_size: usize,
}

impl WebHdfsBackend {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            user: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Send `user.name` with every request (simple authentication).
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Translate a `webhdfs://` location into the REST endpoint for `op`.
    fn endpoint(&self, path: &str, op: &str) -> Result<Url, BackendError> {
        let location = Url::parse(path)?;
        let http_scheme = match location.scheme() {
            "webhdfs" => "http",
            "swebhdfs" => "https",
            other => {
                return Err(BackendError::InvalidPath {
                    message: format!("'{}' is not a WebHDFS scheme in {}", other, path),
                })
            }
        };
        let host = location.host_str().ok_or_else(|| BackendError::InvalidPath {
            message: format!("missing namenode host in {}", path),
        })?;
        let authority = match location.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut endpoint = Url::parse(&format!(
            "{}://{}/webhdfs/v1{}",
            http_scheme,
            authority,
            location.path()
        ))?;
        {
            let mut query = endpoint.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
        }
        Ok(endpoint)
    }

    fn request(&self, method: Method, path: &str, op: &str) -> Result<RequestBuilder, BackendError> {
        let endpoint = self.endpoint(path, op)?;
        log::debug!("{} {}", method, endpoint);
        Ok(self.client.request(method, endpoint))
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

    fn create(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError> {
        let response = self
            .request(Method::PUT, path, "CREATE")?
            .query(&[("overwrite", "true")])
            .body(data)
            .send()?;
        Self::check(response, path)?;
        Ok(())
    }
}

impl Default for WebHdfsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for WebHdfsBackend {
    fn name(&self) -> &'static str {
        "webhdfs"
    }

    fn read(&self, path: &str) -> Result<ByteStream, BackendError> {
        let response = self.request(Method::GET, path, "OPEN")?.send()?;
        let response = Self::check(response, path)?;
        Ok(Box::new(ReadChunks::new(response, path, self.chunk_size)))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let response = self.request(Method::GET, path, "LISTSTATUS")?.send()?;
        let listing: ListStatusResponse = Self::check(response, path)?.json()?;
        let mut names: Vec<String> = listing
            .file_statuses
            .file_status
            .into_iter()
            .map(|status| status.path_suffix)
            .collect();
        names.sort();
        Ok(names)
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
                    self.create(&target, data)?;
                }
            }
        } else {
            let data =
                fs::read(source).map_err(|e| BackendError::io(source.display().to_string(), e))?;
            self.create(&destination, data)?;
        }

        self.exists(&destination)
    }

    fn mkdir(&self, path: &str) -> Result<(), BackendError> {
        let response = self.request(Method::PUT, path, "MKDIRS")?.send()?;
        let created: BooleanResponse = Self::check(response, path)?.json()?;
        if !created.boolean {
            return Err(BackendError::InvalidPath {
                message: format!("namenode refused to create {}", path),
            });
        }
        Ok(())
    }

    fn touch(&self, path: &str) -> Result<(), BackendError> {
        if self.exists(path)? {
            return Ok(());
        }
        self.create(path, Vec::new())
    }

    fn unlink(&self, path: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, path, "DELETE")?
            .query(&[("recursive", "false")])
            .send()?;
        let deleted: BooleanResponse = Self::check(response, path)?.json()?;
        if !deleted.boolean {
            return Err(BackendError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        let response = self.request(Method::GET, path, "GETFILESTATUS")?.send()?;
        match Self::check(response, path) {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<(), BackendError> {
        self.create(path, data.to_vec())
    }
}
