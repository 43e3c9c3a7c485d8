//! Error types for the backend layer.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("No backend registered for scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}

impl BackendError {
    /// Wrap an I/O error, folding `NotFound` into [`BackendError::NotFound`].
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            BackendError::NotFound { path }
        } else {
            BackendError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }

    /// True for codec failures, i.e. a document that exists but cannot be parsed.
    pub fn is_malformed_document(&self) -> bool {
        matches!(self, BackendError::Json(_) | BackendError::Yaml(_))
    }
}
