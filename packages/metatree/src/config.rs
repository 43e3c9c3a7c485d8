//! Root configuration persisted once per tree.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use metatree_backend::{join, Backend, DocumentFormat};

use crate::{Error, Result, Schema};

/// File name of the root configuration document.
pub const CONFIG_FILENAME: &str = ".metatree";

/// The key schema and locking flag of a root, written at initialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RootConfig {
    pub keys: Vec<String>,
    #[serde(default)]
    pub locking_enabled: bool,
    #[serde(default)]
    pub metadata_format: DocumentFormat,
}

impl RootConfig {
    pub fn new(schema: &Schema, locking_enabled: bool, metadata_format: DocumentFormat) -> Self {
        Self {
            keys: schema.keys().to_vec(),
            locking_enabled,
            metadata_format,
        }
    }

    pub fn path(root: &str) -> String {
        join(root, CONFIG_FILENAME)
    }

    /// The persisted schema, validated.
    pub fn schema(&self) -> Result<Schema> {
        Schema::new(self.keys.iter().cloned())
    }

    /// Read the configuration of `root`.
    ///
    /// A document that cannot be interpreted as a configuration (including a
    /// missing or malformed one) is an [`Error::InvalidConfig`].
    pub fn load(backend: &dyn Backend, root: &str) -> Result<Self> {
        let path = Self::path(root);
        let document = backend.read_document(&path)?;
        let config: RootConfig = serde_json::from_value(JsonValue::Object(document))
            .map_err(|e| Error::InvalidConfig {
                path: path.clone(),
                message: e.to_string(),
            })?;
        config.schema().map_err(|e| Error::InvalidConfig {
            path,
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Rewrite the whole configuration document.
    pub fn save(&self, backend: &dyn Backend, root: &str) -> Result<()> {
        let path = Self::path(root);
        let document = match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map,
            Ok(other) => {
                return Err(Error::InvalidConfig {
                    path,
                    message: format!("configuration serialized to {}", other),
                })
            }
            Err(e) => {
                return Err(Error::InvalidConfig {
                    path,
                    message: e.to_string(),
                })
            }
        };
        backend.write_document(&path, &document)?;
        Ok(())
    }
}
