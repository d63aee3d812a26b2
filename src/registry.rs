//! The [`Registry`]: a loaded document plus the settings used to read it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::document::{parse_document, read_document, write_document, DocumentFormat};
use crate::error::{RegistryError, Result};
use crate::locator::{normalize_path, DocumentLocator};
use crate::macros::{
    Environment, MacroExpander, MacroPrecedence, MacroSource, ProcessEnvironment,
};
use crate::path::{resolve, KeyDelimiters, KeyPath};
use crate::validate::normalize_and_validate;
use crate::value::{integral_float, Mapping, Value};


/// A hierarchical configuration registry.
///
/// A registry owns the full document tree and a *view* of it. The view is the
/// whole document after a load, or a subtree for registries created with
/// [`Registry::subkey`]. Lookups go through the view, while macros always
/// resolve against the full document, so a subkey view can still use keys that
/// live outside of it.
///
/// The full tree is shared between a registry and all of its subkey views and
/// is never modified after it has been loaded.
#[derive(Debug, Clone)]
pub struct Registry {
    file_path: Option<PathBuf>,
    full_tree: Option<Arc<Value>>,
    view_tree: Option<Arc<Value>>,
    macro_precedence: MacroPrecedence,
    key_delimiters: KeyDelimiters,
    environment: Arc<dyn Environment>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry that reads macros from the process environment.
    pub fn new() -> Self {
        Self {
            file_path: None,
            full_tree: None,
            view_tree: None,
            macro_precedence: MacroPrecedence::default(),
            key_delimiters: KeyDelimiters::default(),
            environment: Arc::new(ProcessEnvironment),
        }
    }

    /// Creates a registry and loads the document at `locator` into it.
    pub fn open<L>(locator: L) -> Result<Self>
    where
        L: Into<DocumentLocator>,
    {
        let mut registry = Self::new();
        registry.load(locator, None)?;
        Ok(registry)
    }

    pub fn with_macro_precedence(mut self, precedence: MacroPrecedence) -> Self {
        self.macro_precedence = precedence;
        self
    }

    pub fn with_key_delimiters(mut self, delimiters: KeyDelimiters) -> Self {
        self.key_delimiters = delimiters;
        self
    }

    /// Replaces the environment macros are looked up in.
    pub fn with_environment<E>(mut self, environment: E) -> Self
    where
        E: Environment + 'static,
    {
        self.environment = Arc::new(environment);
        self
    }


    /// Loads a document from disk, replacing anything loaded before.
    ///
    /// The tree is normalized and validated before it becomes visible. If
    /// `subkey` is given, the view is narrowed to that subtree. On failure the
    /// registry is left empty.
    pub fn load<L>(&mut self, locator: L, subkey: Option<KeyPath>) -> Result<&Value>
    where
        L: Into<DocumentLocator>,
    {
        self.clear();

        let path = locator.into().to_path()?;
        debug!(path = %path.display(), "Loading configuration document.");

        let tree = read_document(&path)?;
        let file_path = dunce::canonicalize(&path)
            .map_err(|source| RegistryError::Load { path, source })?;

        self.install(tree, subkey.as_ref())?;
        self.file_path = Some(file_path);

        self.view_or_empty()
    }

    /// Loads a document from text. `!include` paths are relative to the current directory.
    pub fn load_from_text(
        &mut self,
        text: &str,
        format: DocumentFormat,
        subkey: Option<KeyPath>,
    ) -> Result<&Value> {
        self.clear();

        let tree = parse_document(text, format, Path::new("."))?;
        self.install(tree, subkey.as_ref())?;

        self.view_or_empty()
    }

    fn install(&mut self, mut tree: Value, subkey: Option<&KeyPath>) -> Result<()> {
        normalize_and_validate(&mut tree)?;

        let full_tree = Arc::new(tree);
        let view_tree = match subkey {
            Some(subkey) => {
                let subtree = resolve(subkey, &full_tree, &self.key_delimiters)?
                    .ok_or_else(|| RegistryError::KeyNotFound {
                        key: subkey.to_string(),
                    })?;
                Arc::new(subtree.clone())
            }
            None => Arc::clone(&full_tree),
        };

        self.full_tree = Some(full_tree);
        self.view_tree = Some(view_tree);
        Ok(())
    }

    fn clear(&mut self) {
        self.file_path = None;
        self.full_tree = None;
        self.view_tree = None;
    }

    fn view_or_empty(&self) -> Result<&Value> {
        self.view_tree
            .as_deref()
            .ok_or_else(|| RegistryError::configuration("the registry holds no values"))
    }

    /// Replaces the values with a tree built in code, without validating it.
    pub fn set_values(&mut self, values: Value) {
        let tree = Arc::new(values);

        self.file_path = None;
        self.full_tree = Some(Arc::clone(&tree));
        self.view_tree = Some(tree);
    }

    /// The values visible through this registry, `None` if nothing was loaded.
    pub fn values(&self) -> Option<&Value> {
        self.view_tree.as_deref()
    }

    /// The entire document macros are resolved against.
    pub fn full_values(&self) -> Option<&Value> {
        self.full_tree.as_deref()
    }

    /// The file last read from or written to.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }


    pub fn macro_precedence(&self) -> &MacroPrecedence {
        &self.macro_precedence
    }

    pub fn set_macro_precedence<I>(&mut self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = MacroSource>,
    {
        self.macro_precedence = MacroPrecedence::new(sources)?;
        Ok(())
    }

    pub fn key_delimiters(&self) -> &KeyDelimiters {
        &self.key_delimiters
    }

    pub fn set_key_delimiters<I>(&mut self, delimiters: I) -> Result<()>
    where
        I: IntoIterator<Item = char>,
    {
        self.key_delimiters = KeyDelimiters::new(delimiters)?;
        Ok(())
    }


    /// Creates a registry whose view is the mapping or sequence at `key`.
    ///
    /// The new registry shares the full document, so its macros still resolve
    /// against every key of it. Settings are copied and can be changed
    /// independently afterwards.
    pub fn subkey<K>(&self, key: K) -> Result<Registry>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        let subtree = match self.view_tree.as_deref() {
            Some(view) => resolve(&key, view, &self.key_delimiters)?,
            None => None,
        }
        .ok_or_else(|| RegistryError::KeyNotFound {
            key: key.to_string(),
        })?;

        if !subtree.is_container() {
            return Err(RegistryError::Conversion {
                key: key.to_string(),
                expected: "a mapping or sequence",
                found: subtree.kind_name(),
            });
        }

        debug!(%key, "Creating subkey view.");

        Ok(Registry {
            file_path: self.file_path.clone(),
            full_tree: self.full_tree.clone(),
            view_tree: Some(Arc::new(subtree.clone())),
            macro_precedence: self.macro_precedence.clone(),
            key_delimiters: self.key_delimiters.clone(),
            environment: Arc::clone(&self.environment),
        })
    }

    fn expander(&self) -> MacroExpander<'_> {
        MacroExpander {
            full_tree: self.full_tree.as_deref(),
            precedence: &self.macro_precedence,
            delimiters: &self.key_delimiters,
            environment: self.environment.as_ref(),
        }
    }

    /// Looks up `key` in the view and expands its macros.
    ///
    /// Returns `Ok(None)` if the key does not exist. Values are expanded on
    /// every call, nothing is cached.
    pub fn get<K>(&self, key: K) -> Result<Option<Value>>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        let Some(view) = self.view_tree.as_deref() else {
            return Ok(None);
        };

        match resolve(&key, view, &self.key_delimiters)? {
            Some(found) => self.expander().expand(found.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`Registry::get`], but a missing key is an error.
    pub fn value<K>(&self, key: K) -> Result<Value>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        self.get(key.clone())?
            .ok_or_else(|| RegistryError::KeyNotFound {
                key: key.to_string(),
            })
    }


    pub fn as_string<K>(&self, key: K) -> Result<String>
    where
        K: Into<KeyPath>,
    {
        Ok(self.value(key)?.to_string())
    }

    /// Integers, integral floats and strings holding an integer.
    pub fn as_integer<K>(&self, key: K) -> Result<i64>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();
        let value = self.value(key.clone())?;

        integer_of(&value).ok_or_else(|| conversion_error(&key, "an integer", &value))
    }

    /// Numbers and strings holding a number.
    pub fn as_float<K>(&self, key: K) -> Result<f64>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();
        let value = self.value(key.clone())?;

        float_of(&value).ok_or_else(|| conversion_error(&key, "a number", &value))
    }

    /// The value as text, lexically normalized as a path.
    pub fn as_pathname<K>(&self, key: K) -> Result<PathBuf>
    where
        K: Into<KeyPath>,
    {
        let text = self.as_string(key)?;
        Ok(normalize_path(Path::new(&text)))
    }

    pub fn as_sequence<K>(&self, key: K) -> Result<Vec<Value>>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        match self.value(key.clone())? {
            Value::Sequence(values) => Ok(values),
            other => Err(conversion_error(&key, "a sequence", &other)),
        }
    }

    /// A sequence of numbers (or numeric strings) as floats.
    pub fn as_float_array<K>(&self, key: K) -> Result<Vec<f64>>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        self.as_sequence(key.clone())?
            .iter()
            .map(|element| {
                float_of(element)
                    .ok_or_else(|| conversion_error(&key, "a sequence of numbers", element))
            })
            .collect()
    }

    pub fn as_mapping<K>(&self, key: K) -> Result<Mapping>
    where
        K: Into<KeyPath>,
    {
        let key = key.into();

        match self.value(key.clone())? {
            Value::Mapping(mapping) => Ok(mapping),
            other => Err(conversion_error(&key, "a mapping", &other)),
        }
    }


    /// Writes the view (or `values`, which then replace the view) to `locator`.
    ///
    /// An existing destination is always removed first. Nothing is written if
    /// there are no values. Missing parent directories are only created when
    /// `make_directories` is set.
    pub fn save<L>(
        &mut self,
        locator: L,
        values: Option<Value>,
        make_directories: bool,
    ) -> Result<()>
    where
        L: Into<DocumentLocator>,
    {
        let path = locator.into().to_path()?;

        if path.exists() {
            fs::remove_file(&path).map_err(|error| RegistryError::write(&path, error))?;
        }

        if let Some(values) = values {
            self.set_values(values);
        }

        let Some(view) = self.view_tree.as_deref().filter(|view| !view.is_empty()) else {
            debug!(path = %path.display(), "Registry is empty, nothing written.");
            return Ok(());
        };

        if let Some(directory) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if !directory.exists() {
                if !make_directories {
                    return Err(RegistryError::write(
                        &path,
                        format!(
                            "the directory {} does not exist, perhaps allow creating directories",
                            directory.display()
                        ),
                    ));
                }

                fs::create_dir_all(directory)
                    .map_err(|error| RegistryError::write(&path, error))?;
            }
        }

        write_document(&path, view)?;
        debug!(path = %path.display(), "Saved configuration document.");

        let file_path =
            dunce::canonicalize(&path).map_err(|error| RegistryError::write(&path, error))?;
        self.file_path = Some(file_path);

        Ok(())
    }
}


fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(integer) => Some(*integer),
        Value::Float(float) => integral_float(*float),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(integer) => Some(*integer as f64),
        Value::Float(float) => Some(*float),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn conversion_error(key: &KeyPath, expected: &'static str, found: &Value) -> RegistryError {
    RegistryError::Conversion {
        key: key.to_string(),
        expected,
        found: found.kind_name(),
    }
}
