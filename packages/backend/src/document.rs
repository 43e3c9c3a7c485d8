//! Small associative documents stored next to nodes (metadata, root config).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::BackendError;

/// A whole document: a string-keyed JSON object.
pub type Document = serde_json::Map<String, JsonValue>;

/// Wire format of a document, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yml` and `.yaml` files are YAML, everything else is JSON.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".yml") || path.ends_with(".yaml") {
            DocumentFormat::Yaml
        } else {
            DocumentFormat::Json
        }
    }

    /// Name of the per-node metadata document in this format.
    pub fn metadata_filename(self) -> &'static str {
        match self {
            DocumentFormat::Json => "metadata.json",
            DocumentFormat::Yaml => "metadata.yml",
        }
    }

    /// Decode bytes into a document.
    ///
    /// Anything that does not decode to an object (including an empty file)
    /// is reported as a codec error so callers can treat it as malformed.
    pub fn decode(self, bytes: &[u8]) -> Result<Document, BackendError> {
        let value: JsonValue = match self {
            DocumentFormat::Json => serde_json::from_slice(bytes)?,
            DocumentFormat::Yaml => serde_yaml::from_slice(bytes)?,
        };

        match value {
            JsonValue::Object(map) => Ok(map),
            other => Err(BackendError::Json(serde::de::Error::custom(format!(
                "expected a document object, found {}",
                other
            )))),
        }
    }

    pub fn encode(self, document: &Document) -> Result<Vec<u8>, BackendError> {
        match self {
            DocumentFormat::Json => Ok(serde_json::to_vec(document)?),
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(document)?.into_bytes()),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Json => write!(f, "json"),
            DocumentFormat::Yaml => write!(f, "yaml"),
        }
    }
}
