//! Loading of the raw provider configuration document.
//!
//! The document is handed to the OAuth core untouched; validation happens
//! there. This module only turns a `.json` or `.toml` file into a JSON tree.

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum ProvidersDocumentError {
    Io(std::io::Error),
    Parse(String),
    UnsupportedFormat(String),
}

impl fmt::Display for ProvidersDocumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Unable to read provider configuration: {}", e),
            Self::Parse(message) => {
                write!(f, "Unable to parse provider configuration: {}", message)
            }
            Self::UnsupportedFormat(ext) => {
                write!(f, "Unsupported provider configuration format `{}`", ext)
            }
        }
    }
}

impl StdError for ProvidersDocumentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProvidersDocumentError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Read the provider document at `path`, choosing the format by extension.
pub fn load_document(path: &Path) -> Result<Value, ProvidersDocumentError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let content = fs::read_to_string(path)?;

    parse_document(&content, &extension)
}

/// Parse a provider document held in memory.
pub fn parse_document(content: &str, format: &str) -> Result<Value, ProvidersDocumentError> {
    match format {
        "json" => serde_json::from_str(content)
            .map_err(|e| ProvidersDocumentError::Parse(e.to_string())),
        "toml" => toml::from_str::<Value>(content)
            .map_err(|e| ProvidersDocumentError::Parse(e.to_string())),
        other => Err(ProvidersDocumentError::UnsupportedFormat(other.to_string())),
    }
}
