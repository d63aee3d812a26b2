//! Reading and writing configuration documents.
//!
//! Two formats are supported, chosen by file extension: YAML (the default,
//! with an `!include` directive) and TOML. Both are turned into the generic
//! [`Value`] tree; nothing here knows about macros or key paths.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::value::Value;

mod toml_format;
mod yaml_format;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// `.toml` files are TOML, everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "YAML",
            DocumentFormat::Toml => "TOML",
        }
    }
}


/// Parses document text. Relative `!include` paths are resolved against `include_root`.
pub fn parse_document(text: &str, format: DocumentFormat, include_root: &Path) -> Result<Value> {
    match format {
        DocumentFormat::Yaml => yaml_format::parse(text, include_root),
        DocumentFormat::Toml => toml_format::parse(text),
    }
}

/// Reads and parses the document at `path`.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let include_root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let format = DocumentFormat::from_path(path);
    debug!(path = %path.display(), format = format.name(), "Parsing configuration document.");

    parse_document(&text, format, include_root)
}

/// Serializes a tree into document text.
pub fn render_document(value: &Value, format: DocumentFormat) -> Result<String, String> {
    match format {
        DocumentFormat::Yaml => yaml_format::render(value),
        DocumentFormat::Toml => toml_format::render(value),
    }
}

/// Serializes a tree and writes it to `path`, in the format implied by its extension.
pub fn write_document(path: &Path, value: &Value) -> Result<()> {
    let text = render_document(value, DocumentFormat::from_path(path))
        .map_err(|reason| RegistryError::write(path, reason))?;

    fs::write(path, text).map_err(|error| RegistryError::write(path, error))
}
