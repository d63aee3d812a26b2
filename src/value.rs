//! The generic tree model every document is turned into.
//!
//! A tree is made of [`Value`]s: scalars, sequences of values and mappings
//! from [`Key`]s to values. Mapping keys are restricted to the scalar kinds
//! that can be hashed and compared, see [`KeyKind`].

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;


/// Mapping keys keep the order they were read in so a document can be
/// written back the way it was loaded.
pub type Mapping = IndexMap<Key, Value>;


#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

/// The type of a mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    String,
    Integer,
    Float,
    Date,
    DateTime,
}

impl Display for KeyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::String => "string",
            KeyKind::Integer => "integer",
            KeyKind::Float => "float",
            KeyKind::Date => "date",
            KeyKind::DateTime => "datetime",
        };

        f.write_str(name)
    }
}


/// A mapping key.
///
/// Float keys are compared by their bit pattern (with `-0.0` folded into `0.0`
/// and every NaN treated as the same key), which makes them usable as map keys.
#[derive(Debug, Clone)]
pub enum Key {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::String(_) => KeyKind::String,
            Key::Integer(_) => KeyKind::Integer,
            Key::Float(_) => KeyKind::Float,
            Key::Date(_) => KeyKind::Date,
            Key::DateTime(_) => KeyKind::DateTime,
        }
    }
}

fn canonical_float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::String(a), Key::String(b)) => a == b,
            (Key::Integer(a), Key::Integer(b)) => a == b,
            (Key::Float(a), Key::Float(b)) => canonical_float_bits(*a) == canonical_float_bits(*b),
            (Key::Date(a), Key::Date(b)) => a == b,
            (Key::DateTime(a), Key::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Key::String(value) => value.hash(state),
            Key::Integer(value) => value.hash(state),
            Key::Float(value) => canonical_float_bits(*value).hash(state),
            Key::Date(value) => value.hash(state),
            Key::DateTime(value) => value.hash(state),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::String(value) => f.write_str(value),
            Key::Integer(value) => write!(f, "{value}"),
            Key::Float(value) => write_float(f, *value),
            Key::Date(value) => write_date(f, value),
            Key::DateTime(value) => write_datetime(f, value),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::String(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Integer(value)
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Float(value)
    }
}

impl From<NaiveDate> for Key {
    fn from(value: NaiveDate) -> Self {
        Key::Date(value)
    }
}

impl From<NaiveDateTime> for Key {
    fn from(value: NaiveDateTime) -> Self {
        Key::DateTime(value)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::String(value) => Value::String(value),
            Key::Integer(value) => Value::Integer(value),
            Key::Float(value) => Value::Float(value),
            Key::Date(value) => Value::Date(value),
            Key::DateTime(value) => Value::DateTime(value),
        }
    }
}


impl Value {
    /// Human-readable name of the value's type, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for mappings and sequences.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Mapping(_) | Value::Sequence(_))
    }

    /// A value is empty if it is null or has a length of zero.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(value) => value.is_empty(),
            Value::Sequence(values) => values.is_empty(),
            Value::Mapping(mapping) => mapping.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}


fn write_float(f: &mut Formatter<'_>, value: f64) -> fmt::Result {
    // Integral floats keep a fractional part so they read back as floats.
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        write!(f, "{value:.1}")
    } else {
        write!(f, "{value}")
    }
}

fn write_date(f: &mut Formatter<'_>, value: &NaiveDate) -> fmt::Result {
    write!(f, "{}", value.format("%Y-%m-%d"))
}

fn write_datetime(f: &mut Formatter<'_>, value: &NaiveDateTime) -> fmt::Result {
    write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S%.f"))
}

/// Text form of a value, as substituted into macros and returned by
/// `as_string`. Scalars print bare. Datetimes use a `T` separator
/// (`2020-10-20T00:00:00`) rather than the space some other tools print, so
/// the text reads back through ISO-8601 parsing unchanged.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write_float(f, *value),
            Value::String(value) => f.write_str(value),
            Value::Date(value) => write_date(f, value),
            Value::DateTime(value) => write_datetime(f, value),
            Value::Sequence(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Value::Mapping(mapping) => {
                f.write_str("{")?;
                for (index, (key, value)) in mapping.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}


impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Sequence(values)
    }
}

impl From<Mapping> for Value {
    fn from(mapping: Mapping) -> Self {
        Value::Mapping(mapping)
    }
}


/// 2^63, the first float above the `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// The integer an integral float stands for, `None` if it has a fractional
/// part or lies outside the `i64` range.
pub fn integral_float(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

/// The float an integer stands for, `None` if the conversion would round.
pub fn exact_float(value: i64) -> Option<f64> {
    let float = value as f64;
    (integral_float(float) == Some(value)).then_some(float)
}

/// Midnight of the given day.
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() != 10 {
        return None;
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Parses an ISO-8601 datetime.
///
/// Date-only strings are accepted as midnight of that day, the date and time
/// may be separated by `T` or a space, and explicit offsets are converted to UTC.
pub fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Some(date) = parse_iso_date(text) {
        return Some(midnight(date));
    }

    // The shortest datetime we accept is `YYYY-MM-DDTHH:MM`.
    if text.len() < 16 || !text.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(datetime) = DateTime::parse_from_str(text, format) {
            return Some(datetime.naive_utc());
        }
    }

    let naive_text = text.strip_suffix(&['Z', 'z'][..]).unwrap_or(text);
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(datetime);
        }
    }

    None
}
