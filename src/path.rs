//! Walking a delimited key path through a tree.
//!
//! A path like `vis/psfdata/2020-10-20/350.0/0` is split into segments, and
//! each segment is coerced to the kind of key found at the level it addresses:
//! `2020-10-20` becomes a datetime key, `350.0` a float key and `0` a sequence
//! index. Paths can also be given pre-split or as a single typed key.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::trace;

use crate::error::{RegistryError, Result};
use crate::value::{
    exact_float, integral_float, midnight, parse_iso_date, parse_iso_datetime, Key, KeyKind, Value,
};


/// A path addressing a value inside a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPath {
    /// A delimited path string, split with the configured [`KeyDelimiters`].
    Text(String),
    /// A path that is already split into segments.
    Segments(Vec<Key>),
    /// A single key, used as is (never stringified).
    Key(Key),
}

impl KeyPath {
    pub fn segments(&self, delimiters: &KeyDelimiters) -> Vec<Key> {
        match self {
            KeyPath::Text(text) => delimiters.split(text),
            KeyPath::Segments(segments) => segments.clone(),
            KeyPath::Key(key) => vec![key.clone()],
        }
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Text(text) => f.write_str(text),
            KeyPath::Segments(segments) => {
                for (index, segment) in segments.iter().enumerate() {
                    if index > 0 {
                        f.write_str("/")?;
                    }
                    write!(f, "{segment}")?;
                }
                Ok(())
            }
            KeyPath::Key(key) => write!(f, "{key}"),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(value: &str) -> Self {
        KeyPath::Text(value.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(value: String) -> Self {
        KeyPath::Text(value)
    }
}

impl From<&String> for KeyPath {
    fn from(value: &String) -> Self {
        KeyPath::Text(value.clone())
    }
}

impl From<i64> for KeyPath {
    fn from(value: i64) -> Self {
        KeyPath::Key(Key::Integer(value))
    }
}

impl From<i32> for KeyPath {
    fn from(value: i32) -> Self {
        KeyPath::Key(Key::Integer(i64::from(value)))
    }
}

impl From<usize> for KeyPath {
    fn from(value: usize) -> Self {
        // Indices beyond i64::MAX cannot address anything and fall out of range anyway.
        KeyPath::Key(Key::Integer(i64::try_from(value).unwrap_or(i64::MAX)))
    }
}

impl From<f64> for KeyPath {
    fn from(value: f64) -> Self {
        KeyPath::Key(Key::Float(value))
    }
}

impl From<NaiveDate> for KeyPath {
    fn from(value: NaiveDate) -> Self {
        KeyPath::Key(Key::Date(value))
    }
}

impl From<NaiveDateTime> for KeyPath {
    fn from(value: NaiveDateTime) -> Self {
        KeyPath::Key(Key::DateTime(value))
    }
}

impl From<Key> for KeyPath {
    fn from(value: Key) -> Self {
        KeyPath::Key(value)
    }
}

impl From<Vec<Key>> for KeyPath {
    fn from(value: Vec<Key>) -> Self {
        KeyPath::Segments(value)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(value: Vec<&str>) -> Self {
        KeyPath::Segments(value.into_iter().map(Key::from).collect())
    }
}

impl From<&[&str]> for KeyPath {
    fn from(value: &[&str]) -> Self {
        KeyPath::Segments(value.iter().copied().map(Key::from).collect())
    }
}


/// The ordered list of characters that separate path segments.
///
/// The last delimiter is the canonical one; every other delimiter is an alias
/// that gets replaced by the canonical one before a path is split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDelimiters {
    delimiters: Vec<char>,
}

impl KeyDelimiters {
    pub fn new<I>(delimiters: I) -> Result<Self>
    where
        I: IntoIterator<Item = char>,
    {
        let delimiters: Vec<char> = delimiters.into_iter().collect();

        if delimiters.is_empty() {
            return Err(RegistryError::configuration(
                "at least one key delimiter is required",
            ));
        }

        Ok(Self { delimiters })
    }

    /// Builds the delimiters from a list of strings that must each hold exactly one character.
    pub fn from_strings<S>(delimiters: &[S]) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let characters = delimiters
            .iter()
            .map(|delimiter| {
                let delimiter = delimiter.as_ref();
                let mut characters = delimiter.chars();

                match (characters.next(), characters.next()) {
                    (Some(character), None) => Ok(character),
                    _ => Err(RegistryError::configuration(format!(
                        "key delimiter {delimiter:?} must be a single character"
                    ))),
                }
            })
            .collect::<Result<Vec<char>>>()?;

        Self::new(characters)
    }

    pub fn canonical(&self) -> char {
        // Construction guarantees at least one delimiter.
        self.delimiters[self.delimiters.len() - 1]
    }

    pub fn as_slice(&self) -> &[char] {
        &self.delimiters
    }

    /// Normalizes the aliases to the canonical delimiter and splits on it.
    pub fn split(&self, path: &str) -> Vec<Key> {
        let canonical = self.canonical();
        let aliases = &self.delimiters[..self.delimiters.len() - 1];

        let normalized: String = path
            .chars()
            .map(|character| {
                if aliases.contains(&character) {
                    canonical
                } else {
                    character
                }
            })
            .collect();

        normalized.split(canonical).map(Key::from).collect()
    }
}

impl Default for KeyDelimiters {
    fn default() -> Self {
        Self {
            delimiters: vec!['/'],
        }
    }
}

impl FromStr for KeyDelimiters {
    type Err = RegistryError;

    /// Every character of the string is one delimiter, the last one canonical.
    fn from_str(value: &str) -> Result<Self> {
        Self::new(value.chars())
    }
}


/// Interprets a path segment as a key of the given kind.
///
/// Typed segments are accepted when they already have the requested kind or
/// convert to it without loss. String segments are parsed.
pub fn coerce(segment: &Key, kind: KeyKind) -> Result<Key> {
    let invalid = || RegistryError::PathSegment {
        segment: segment.to_string(),
        expected: kind,
    };

    match kind {
        KeyKind::String => Ok(segment.clone()),
        KeyKind::Integer => match segment {
            Key::Integer(value) => Ok(Key::Integer(*value)),
            Key::String(text) => text.parse::<i64>().map(Key::Integer).map_err(|_| invalid()),
            Key::Float(value) => integral_float(*value).map(Key::Integer).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        KeyKind::Float => match segment {
            Key::Float(value) => Ok(Key::Float(*value)),
            Key::Integer(value) => exact_float(*value).map(Key::Float).ok_or_else(invalid),
            Key::String(text) => text.parse::<f64>().map(Key::Float).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        KeyKind::DateTime => match segment {
            Key::DateTime(value) => Ok(Key::DateTime(*value)),
            Key::Date(value) => Ok(Key::DateTime(midnight(*value))),
            Key::String(text) => parse_iso_datetime(text)
                .map(Key::DateTime)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        KeyKind::Date => match segment {
            Key::Date(value) => Ok(Key::Date(*value)),
            Key::String(text) => parse_iso_date(text).map(Key::Date).ok_or_else(invalid),
            _ => Err(invalid()),
        },
    }
}


fn sequence_index(segment: &Key, length: usize) -> Result<usize> {
    let invalid = || RegistryError::PathIndex {
        segment: segment.to_string(),
        length,
    };

    let index = match segment {
        Key::Integer(value) => *value,
        Key::String(text) => text.parse::<i64>().map_err(|_| invalid())?,
        Key::Float(value) => integral_float(*value).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    usize::try_from(index)
        .ok()
        .filter(|index| *index < length)
        .ok_or_else(invalid)
}

/// Looks up one segment in one level of the tree.
fn locate_child<'t>(segment: &Key, level: &'t Value) -> Result<Option<&'t Value>> {
    match level {
        Value::Mapping(mapping) => {
            // All keys of a mapping share one kind, so any key tells us how to read the segment.
            let Some(reference_key) = mapping.keys().next() else {
                return Ok(None);
            };

            let key = coerce(segment, reference_key.kind())?;
            Ok(mapping.get(&key))
        }
        Value::Sequence(values) => {
            let index = sequence_index(segment, values.len())?;
            Ok(values.get(index))
        }
        _ => Ok(None),
    }
}

/// Resolves `path` against `base`, returning `None` when any level on the way is absent.
///
/// The returned value is a borrow into the tree; macros are not expanded here.
pub fn resolve<'t>(
    path: &KeyPath,
    base: &'t Value,
    delimiters: &KeyDelimiters,
) -> Result<Option<&'t Value>> {
    let segments = path.segments(delimiters);

    let mut current = Some(base);
    for segment in &segments {
        let Some(level) = current else {
            break;
        };

        trace!(%segment, kind = level.kind_name(), "Descending into tree.");
        current = locate_child(segment, level)?;
    }

    Ok(current)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Mapping;

    fn mapping(entries: Vec<(Key, Value)>) -> Value {
        Value::Mapping(entries.into_iter().collect::<Mapping>())
    }

    fn sample_tree() -> Value {
        let day = NaiveDate::from_ymd_opt(2020, 10, 20).unwrap();

        mapping(vec![
            (
                Key::from("a"),
                Value::Sequence(vec![Value::from("x"), Value::from("y"), Value::from("z")]),
            ),
            (
                Key::from("vis"),
                mapping(vec![(
                    Key::DateTime(midnight(day)),
                    mapping(vec![(
                        Key::Float(350.0),
                        mapping(vec![(Key::Integer(7), Value::from("deep"))]),
                    )]),
                )]),
            ),
            (Key::from("empty"), mapping(vec![])),
            (Key::from("nothing"), Value::Null),
            (Key::from("scalar"), Value::Integer(3)),
        ])
    }

    fn lookup(path: impl Into<KeyPath>, delimiters: &KeyDelimiters) -> Result<Option<Value>> {
        let tree = sample_tree();
        resolve(&path.into(), &tree, delimiters).map(|value| value.cloned())
    }

    #[test]
    fn indexes_sequences() {
        let delimiters = KeyDelimiters::default();

        assert_eq!(lookup("a/1", &delimiters).unwrap(), Some(Value::from("y")));
        assert!(matches!(
            lookup("a/5", &delimiters),
            Err(RegistryError::PathIndex { length: 3, .. })
        ));
        assert!(matches!(
            lookup("a/-1", &delimiters),
            Err(RegistryError::PathIndex { .. })
        ));
        assert!(matches!(
            lookup("a/first", &delimiters),
            Err(RegistryError::PathIndex { .. })
        ));
    }

    #[test]
    fn coerces_segments_to_the_key_kind_of_each_level() {
        let delimiters = KeyDelimiters::default();
        let expected = Some(Value::from("deep"));

        assert_eq!(lookup("vis/2020-10-20/350.0/7", &delimiters).unwrap(), expected);
        assert_eq!(lookup("vis/2020-10-20T00:00:00/350/7", &delimiters).unwrap(), expected);
        assert!(matches!(
            lookup("vis/2020-10-20/350.0/seven", &delimiters),
            Err(RegistryError::PathSegment {
                expected: KeyKind::Integer,
                ..
            })
        ));
    }

    #[test]
    fn floats_outside_the_integer_range_do_not_coerce() {
        assert_eq!(
            coerce(&Key::Float(7.0), KeyKind::Integer).unwrap(),
            Key::Integer(7)
        );
        assert!(matches!(
            coerce(&Key::Float(1e19), KeyKind::Integer),
            Err(RegistryError::PathSegment {
                expected: KeyKind::Integer,
                ..
            })
        ));
        assert!(matches!(
            coerce(&Key::Integer(i64::MAX), KeyKind::Float),
            Err(RegistryError::PathSegment {
                expected: KeyKind::Float,
                ..
            })
        ));

        let tree = sample_tree();
        let delimiters = KeyDelimiters::default();
        let path = KeyPath::Segments(vec![Key::from("a"), Key::Float(1e19)]);
        assert!(matches!(
            resolve(&path, &tree, &delimiters),
            Err(RegistryError::PathIndex { length: 3, .. })
        ));
    }

    #[test]
    fn every_delimiter_alias_resolves_the_same() {
        let delimiters: KeyDelimiters = "./".parse().unwrap();
        let expected = Some(Value::from("z"));

        assert_eq!(lookup("a/2", &delimiters).unwrap(), expected);
        assert_eq!(lookup("a.2", &delimiters).unwrap(), expected);
    }

    #[test]
    fn pre_split_and_typed_paths_match_text_paths() {
        let delimiters = KeyDelimiters::default();
        let text = lookup("vis/2020-10-20/350.0/7", &delimiters).unwrap();

        let segments = lookup(vec!["vis", "2020-10-20", "350.0", "7"], &delimiters).unwrap();
        assert_eq!(segments, text);

        let typed = lookup(
            vec![
                Key::from("vis"),
                Key::Date(NaiveDate::from_ymd_opt(2020, 10, 20).unwrap()),
                Key::Float(350.0),
                Key::Integer(7),
            ],
            &delimiters,
        )
        .unwrap();
        assert_eq!(typed, text);

        let tree = Value::Sequence(vec![Value::from("zero"), Value::from("one")]);
        let by_integer = resolve(&KeyPath::from(1), &tree, &delimiters).unwrap();
        let by_text = resolve(&KeyPath::from("1"), &tree, &delimiters).unwrap();
        assert_eq!(by_integer, by_text);
    }

    #[test]
    fn missing_levels_are_not_found() {
        let delimiters = KeyDelimiters::default();

        assert_eq!(lookup("missing", &delimiters).unwrap(), None);
        assert_eq!(lookup("missing/deeper/still", &delimiters).unwrap(), None);
        assert_eq!(lookup("nothing/child", &delimiters).unwrap(), None);
        assert_eq!(lookup("empty/child", &delimiters).unwrap(), None);
        assert_eq!(lookup("scalar/child", &delimiters).unwrap(), None);
        assert_eq!(lookup("nothing", &delimiters).unwrap(), Some(Value::Null));
    }

    #[test]
    fn coerce_is_exhaustive_over_kinds() {
        assert_eq!(coerce(&Key::from("12"), KeyKind::Integer).unwrap(), Key::Integer(12));
        assert_eq!(coerce(&Key::Integer(3), KeyKind::Float).unwrap(), Key::Float(3.0));
        assert_eq!(coerce(&Key::Float(4.0), KeyKind::Integer).unwrap(), Key::Integer(4));
        assert!(coerce(&Key::Float(4.5), KeyKind::Integer).is_err());
        assert_eq!(coerce(&Key::Integer(3), KeyKind::String).unwrap(), Key::Integer(3));
        assert_eq!(
            coerce(&Key::from("2021-03-09"), KeyKind::Date).unwrap(),
            Key::Date(NaiveDate::from_ymd_opt(2021, 3, 9).unwrap())
        );
        assert!(coerce(&Key::from("yesterday"), KeyKind::DateTime).is_err());
    }

    #[test]
    fn delimiters_must_not_be_empty() {
        assert!(KeyDelimiters::new(Vec::new()).is_err());
        assert!(KeyDelimiters::from_strings(&["//"]).is_err());
        assert_eq!(
            KeyDelimiters::from_strings(&[".", "/"]).unwrap().canonical(),
            '/'
        );
    }
}
