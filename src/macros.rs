//! `$( key )$` macro substitution in string values.
//!
//! A macro key is looked up in the sources of a [`MacroPrecedence`], in order:
//! the internal document (resolved as a path against the *full* tree, never a
//! subkey view) and the process environment. The first source that yields a
//! value wins, and its text replaces the macro token.
//!
//! Macro keys cannot nest and values looked up internally are not expanded on
//! their own. After every substitution the string is scanned again from the
//! start, so placeholders carried in by a substituted value are expanded by the
//! same loop. A value that keeps reintroducing placeholders stops with an error
//! after [`MAX_SUBSTITUTIONS`] substitutions.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use tracing::trace;

use crate::error::{RegistryError, Result};
use crate::path::{resolve, KeyDelimiters, KeyPath};
use crate::value::Value;


const MACRO_OPEN: &str = "$(";
const MACRO_CLOSE: &str = ")$";

/// Upper bound on substitutions in a single string.
pub const MAX_SUBSTITUTIONS: usize = 1024;


/// Where a macro key can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroSource {
    /// Another key of the loaded document.
    Internal,
    /// A process environment variable.
    Environment,
}

impl FromStr for MacroSource {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "int" | "internal" => Ok(MacroSource::Internal),
            "env" | "environment" => Ok(MacroSource::Environment),
            other => Err(RegistryError::configuration(format!(
                "the macro processing precedence value {other:?} must be either \
                 \"int\" for internal or \"env\" for environment"
            ))),
        }
    }
}

impl Display for MacroSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MacroSource::Internal => f.write_str("int"),
            MacroSource::Environment => f.write_str("env"),
        }
    }
}


/// The order in which macro sources are tried: one or two distinct sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroPrecedence {
    sources: Vec<MacroSource>,
}

impl MacroPrecedence {
    pub fn new<I>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = MacroSource>,
    {
        let sources: Vec<MacroSource> = sources.into_iter().collect();

        if sources.is_empty() || sources.len() > 2 {
            return Err(RegistryError::configuration(format!(
                "the length of the macro processing precedence order {} must be only 1 or 2",
                sources.len()
            )));
        }

        if sources.len() == 2 && sources[0] == sources[1] {
            return Err(RegistryError::configuration(format!(
                "the macro processing precedence order lists {} twice",
                sources[0]
            )));
        }

        Ok(Self { sources })
    }

    pub fn from_strings<S>(sources: &[S]) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let sources = sources
            .iter()
            .map(|source| source.as_ref().parse::<MacroSource>())
            .collect::<Result<Vec<_>>>()?;

        Self::new(sources)
    }

    pub fn sources(&self) -> &[MacroSource] {
        &self.sources
    }
}

impl Default for MacroPrecedence {
    /// Environment variables override document keys.
    fn default() -> Self {
        Self {
            sources: vec![MacroSource::Environment, MacroSource::Internal],
        }
    }
}

impl FromStr for MacroPrecedence {
    type Err = RegistryError;

    /// Parses a comma-separated list such as `env,int`.
    fn from_str(value: &str) -> Result<Self> {
        let sources: Vec<&str> = value.split(',').collect();
        Self::from_strings(&sources)
    }
}

impl Display for MacroPrecedence {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, source) in self.sources.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{source}")?;
        }
        Ok(())
    }
}


/// Read-only access to environment variables.
pub trait Environment: Debug + Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    variables: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.insert(name, value);
        self
    }

    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.variables.insert(name.into(), value.into());
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }
}


/// Expands the macros of values read from a registry.
#[derive(Debug, Clone, Copy)]
pub struct MacroExpander<'a> {
    /// The whole document; `None` for an empty registry.
    pub full_tree: Option<&'a Value>,
    pub precedence: &'a MacroPrecedence,
    pub delimiters: &'a KeyDelimiters,
    pub environment: &'a dyn Environment,
}

impl<'a> MacroExpander<'a> {
    /// Expands every macro of a string value. Other values are returned unchanged.
    pub fn expand(&self, value: Value) -> Result<Value> {
        match value {
            Value::String(text) => self.expand_text(text).map(Value::String),
            other => Ok(other),
        }
    }

    pub fn expand_text(&self, original: String) -> Result<String> {
        let mut text = original.clone();
        let mut substitutions = 0;

        while let Some(start) = text.find(MACRO_OPEN) {
            let key_start = start + MACRO_OPEN.len();

            let Some(key_length) = text[key_start..].find(MACRO_CLOSE) else {
                return Err(RegistryError::MacroSyntax { text: original });
            };

            if substitutions == MAX_SUBSTITUTIONS {
                return Err(RegistryError::MacroLimit {
                    text: original,
                    limit: MAX_SUBSTITUTIONS,
                });
            }

            let key_end = key_start + key_length;
            let macro_key = text[key_start..key_end].trim();
            let replacement = self.lookup(macro_key, &original)?;

            trace!(macro_key, %replacement, "Substituting macro.");

            text.replace_range(start..key_end + MACRO_CLOSE.len(), &replacement);
            substitutions += 1;
        }

        Ok(text)
    }

    fn lookup(&self, macro_key: &str, original: &str) -> Result<String> {
        for source in self.precedence.sources() {
            let found = match source {
                MacroSource::Internal => match self.full_tree {
                    Some(tree) => resolve(&KeyPath::from(macro_key), tree, self.delimiters)?
                        .filter(|value| !value.is_null())
                        .map(ToString::to_string),
                    None => None,
                },
                MacroSource::Environment => self.environment.var(macro_key),
            };

            if let Some(value) = found {
                return Ok(value);
            }
        }

        Err(RegistryError::UnresolvedMacro {
            macro_key: macro_key.to_string(),
            text: original.to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Key, Mapping};

    fn document() -> Value {
        let mut folders = Mapping::new();
        folders.insert(Key::from("data"), Value::from("/data/files"));

        let mut mapping = Mapping::new();
        mapping.insert(Key::from("base"), Value::from("/data"));
        mapping.insert(Key::from("folders"), Value::Mapping(folders));
        mapping.insert(Key::from("count"), Value::Integer(3));
        mapping.insert(Key::from("literal"), Value::from("$(base)$"));
        mapping.insert(Key::from("unset"), Value::Null);
        Value::Mapping(mapping)
    }

    fn expand_with(
        text: &str,
        precedence: MacroPrecedence,
        environment: &MapEnvironment,
    ) -> Result<String> {
        let tree = document();
        let delimiters = KeyDelimiters::default();
        let expander = MacroExpander {
            full_tree: Some(&tree),
            precedence: &precedence,
            delimiters: &delimiters,
            environment,
        };

        expander.expand_text(text.to_string())
    }

    fn internal_first() -> MacroPrecedence {
        MacroPrecedence::new([MacroSource::Internal, MacroSource::Environment]).unwrap()
    }

    #[test]
    fn precedence_decides_which_source_wins() {
        let environment = MapEnvironment::new().with("base", "/env");

        assert_eq!(
            expand_with("$(base)$/x", MacroPrecedence::default(), &environment).unwrap(),
            "/env/x"
        );
        assert_eq!(
            expand_with("$(base)$/x", internal_first(), &environment).unwrap(),
            "/data/x"
        );
    }

    #[test]
    fn falls_back_to_the_second_source() {
        let environment = MapEnvironment::new().with("ONLY_ENV", "/opt");

        assert_eq!(
            expand_with("$(ONLY_ENV)$/bin", internal_first(), &environment).unwrap(),
            "/opt/bin"
        );
        assert_eq!(
            expand_with("$( folders/data )$/vis", MacroPrecedence::default(), &environment).unwrap(),
            "/data/files/vis"
        );
    }

    #[test]
    fn expands_each_placeholder_left_to_right() {
        let environment = MapEnvironment::new();

        assert_eq!(
            expand_with("$(base)$:$(count)$:$(base)$", internal_first(), &environment).unwrap(),
            "/data:3:/data"
        );
        assert_eq!(
            expand_with("no macros here", internal_first(), &environment).unwrap(),
            "no macros here"
        );
    }

    #[test]
    fn placeholders_carried_in_by_a_substitution_are_expanded() {
        let environment = MapEnvironment::new();

        assert_eq!(
            expand_with("$(literal)$/x", internal_first(), &environment).unwrap(),
            "/data/x"
        );
    }

    #[test]
    fn self_referencing_values_stop_at_the_substitution_limit() {
        let environment = MapEnvironment::new().with("LOOP", "$(LOOP)$");

        assert!(matches!(
            expand_with("$(LOOP)$", MacroPrecedence::default(), &environment),
            Err(RegistryError::MacroLimit {
                limit: MAX_SUBSTITUTIONS,
                ..
            })
        ));
    }

    #[test]
    fn unterminated_macro_is_a_syntax_error() {
        let environment = MapEnvironment::new();

        assert!(matches!(
            expand_with("$(base/x", internal_first(), &environment),
            Err(RegistryError::MacroSyntax { .. })
        ));
    }

    #[test]
    fn unresolved_macro_names_key_and_text() {
        let environment = MapEnvironment::new();

        let Err(RegistryError::UnresolvedMacro { macro_key, text }) =
            expand_with("$( missing )$/x", internal_first(), &environment)
        else {
            panic!("expected an unresolved macro error");
        };
        assert_eq!(macro_key, "missing");
        assert_eq!(text, "$( missing )$/x");

        // Null document values do not count as a substitution.
        assert!(expand_with("$(unset)$", internal_first(), &environment).is_err());
    }

    #[test]
    fn environment_only_precedence_ignores_document_keys() {
        let precedence = MacroPrecedence::new([MacroSource::Environment]).unwrap();

        assert!(expand_with("$(base)$", precedence, &MapEnvironment::new()).is_err());
    }

    #[test]
    fn non_strings_pass_through() {
        let tree = document();
        let precedence = MacroPrecedence::default();
        let delimiters = KeyDelimiters::default();
        let environment = MapEnvironment::new();
        let expander = MacroExpander {
            full_tree: Some(&tree),
            precedence: &precedence,
            delimiters: &delimiters,
            environment: &environment,
        };

        assert_eq!(expander.expand(Value::Integer(5)).unwrap(), Value::Integer(5));
    }

    #[test]
    fn precedence_is_validated() {
        assert!(MacroPrecedence::new(Vec::<MacroSource>::new()).is_err());
        assert!(MacroPrecedence::new([MacroSource::Internal, MacroSource::Internal]).is_err());
        assert!(MacroPrecedence::new([
            MacroSource::Internal,
            MacroSource::Environment,
            MacroSource::Internal,
        ])
        .is_err());
        assert!("env,sys".parse::<MacroPrecedence>().is_err());
        assert_eq!(
            "int,env".parse::<MacroPrecedence>().unwrap(),
            internal_first()
        );
        assert_eq!(MacroPrecedence::default().to_string(), "env,int");
    }
}
