//! Error types for the tree engine.

use std::path::PathBuf;

use metatree_backend::BackendError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Malformed query: {message}")]
    MalformedQuery { message: String },

    #[error("Invalid child specification for key '{key}': {spec}")]
    InvalidChildSpec { key: String, spec: String },

    #[error("Invalid path segment '{segment}': {message}")]
    InvalidSegment { segment: String, message: String },

    #[error("Invalid key schema: {message}")]
    InvalidSchema { message: String },

    #[error("No key schema was supplied to initialize {root}")]
    MissingSchema { root: String },

    #[error("Invalid root configuration at {path}: {message}")]
    InvalidConfig { path: String, message: String },

    #[error("Metadata key '{key}' not found at {path}")]
    MetadataKeyNotFound { key: String, path: String },

    #[error("Child ({child}) is not declared in the metadata of {parent}")]
    UnlinkedChild { child: String, parent: String },

    #[error("Path ({path}) does not exist")]
    NodeNotFound { path: String },

    #[error("The reserved metadata key '{key}' cannot be updated")]
    ReservedKeyViolation { key: String },

    #[error("Source ({}) does not exist", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Destination ({path}) already exists")]
    DestinationExists { path: String },

    #[error("Artifact '{name}' not found in {parent}")]
    ArtifactNotFound { name: String, parent: String },

    #[error("Transfer to {path} did not complete")]
    TransferIncomplete { path: String },

    #[error("Could not acquire lock {marker} after {attempts} attempts")]
    LockTimeout { marker: String, attempts: u32 },

    #[error("Path ({path}) already in use")]
    PathAlreadyInUse { path: String },

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
