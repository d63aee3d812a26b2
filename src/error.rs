//! Error types of the registry.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::value::KeyKind;


/// A single offending key found while validating key homogeneity.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTypeViolation {
    /// Path of the mapping containing the key (`<root>` for the top level).
    pub location: String,
    /// The offending key, in display form.
    pub key: String,
    pub found: KeyKind,
    pub expected: KeyKind,
}

impl std::fmt::Display for KeyTypeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "key {} in {} is of type {}, other keys at this level are of type {}",
            self.key, self.location, self.found, self.expected
        )
    }
}


/// All errors the registry can produce. Every one of them is fatal
/// for the operation that raised it; a missing terminal key is not an error
/// and is reported as `Ok(None)` by the lookup operations instead.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("could not find or read configuration document {path}")]
    #[diagnostic(code(confreg::load))]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} document: {reason}")]
    #[diagnostic(code(confreg::parse))]
    Parse { format: &'static str, reason: String },

    #[error("configuration key type errors occurred ({} offending keys)", .violations.len())]
    #[diagnostic(
        code(confreg::key_type),
        help("all keys of one mapping must share a single type")
    )]
    KeyType { violations: Vec<KeyTypeViolation> },

    #[error("the type {found} of key {key} is not a supported mapping key type")]
    #[diagnostic(code(confreg::unsupported_key_type))]
    UnsupportedKeyType { key: String, found: &'static str },

    #[error("path segment {segment} cannot be used as a {expected} key")]
    #[diagnostic(code(confreg::path_segment))]
    PathSegment { segment: String, expected: KeyKind },

    #[error("sequence index {segment} is invalid for a sequence of length {length}")]
    #[diagnostic(code(confreg::path_index))]
    PathIndex { segment: String, length: usize },

    #[error("could not find the closing )$ of the macro in {text}")]
    #[diagnostic(code(confreg::macro_syntax))]
    MacroSyntax { text: String },

    #[error("macro expansion of {text} did not finish after {limit} substitutions")]
    #[diagnostic(
        code(confreg::macro_limit),
        help("a macro value probably refers back to itself")
    )]
    MacroLimit { text: String, limit: usize },

    #[error(
        "cannot find a macro or environment variable substitution for macro {macro_key} \
         while getting value for {text}"
    )]
    #[diagnostic(code(confreg::unresolved_macro))]
    UnresolvedMacro { macro_key: String, text: String },

    #[error("the configuration key {key} did not produce {expected}, its type was {found}")]
    #[diagnostic(code(confreg::conversion))]
    Conversion {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("the configuration key {key} does not exist")]
    #[diagnostic(code(confreg::key_not_found))]
    KeyNotFound { key: String },

    #[error("invalid registry configuration: {reason}")]
    #[diagnostic(code(confreg::configuration))]
    Configuration { reason: String },

    #[error("cannot write configuration document {path}: {reason}")]
    #[diagnostic(code(confreg::write))]
    Write { path: PathBuf, reason: String },
}

impl RegistryError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn parse(format: &'static str, reason: impl ToString) -> Self {
        Self::Parse {
            format,
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
