//! YAML reading and writing.
//!
//! Documents are read from the parser's event stream rather than through
//! serde, so the style of every scalar is known. Only plain scalars are typed
//! (null, boolean, number, timestamp); quoted and block scalars are always
//! strings. Writing goes through `serde_yaml`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::vec;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_yaml::value::{Tag as YamlTag, TaggedValue};
use serde_yaml::{Mapping as YamlMapping, Number, Value as YamlValue};
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::TScalarStyle;

use crate::error::{RegistryError, Result};
use crate::value::{parse_iso_date, Key, Mapping, Value};


const FORMAT: &str = "YAML";
const INCLUDE_TAG: &str = "include";
const STRING_TAG: &str = "str";
const CORE_SCHEMA_HANDLES: [&str; 2] = ["!!", "tag:yaml.org,2002:"];

const SIGNS: &[char] = &['-', '+'];
const BLANKS: &[char] = &[' ', '\t'];


pub(super) fn parse(text: &str, include_root: &Path) -> Result<Value> {
    let mut events = EventCollector::default();
    Parser::new(text.chars())
        .load(&mut events, false)
        .map_err(|error| RegistryError::parse(FORMAT, error))?;

    TreeBuilder {
        events: events.events.into_iter(),
        anchors: HashMap::new(),
        include_root,
    }
    .document()
}

/// Reads the target of an `!include` directive, relative to the including document.
fn include(file_name: &str, include_root: &Path) -> Result<Value> {
    let path = include_root.join(file_name);
    let text = fs::read_to_string(&path).map_err(|source| RegistryError::Load {
        path: path.clone(),
        source,
    })?;

    let nested_root = path.parent().unwrap_or(include_root);
    parse(&text, nested_root)
}


#[derive(Default)]
struct EventCollector {
    events: Vec<Event>,
}

impl EventReceiver for EventCollector {
    fn on_event(&mut self, event: Event) {
        self.events.push(event);
    }
}


struct TreeBuilder<'a> {
    events: vec::IntoIter<Event>,
    anchors: HashMap<usize, Value>,
    include_root: &'a Path,
}

impl<'a> TreeBuilder<'a> {
    /// The first document of the stream, `Null` for an empty stream.
    fn document(&mut self) -> Result<Value> {
        loop {
            match self.events.next() {
                Some(Event::DocumentStart) => break,
                Some(Event::StreamEnd) | None => return Ok(Value::Null),
                Some(_) => continue,
            }
        }

        let event = self.next_event()?;
        self.node(event)
    }

    fn next_event(&mut self) -> Result<Event> {
        self.events
            .next()
            .ok_or_else(|| RegistryError::parse(FORMAT, "unexpected end of the event stream"))
    }

    fn node(&mut self, event: Event) -> Result<Value> {
        let (value, anchor) = match event {
            Event::Scalar(text, style, anchor, tag) => (self.scalar(text, style, tag)?, anchor),
            Event::SequenceStart(anchor, tag) => {
                reject_container_tag(tag)?;
                (self.sequence()?, anchor)
            }
            Event::MappingStart(anchor, tag) => {
                reject_container_tag(tag)?;
                (self.mapping()?, anchor)
            }
            Event::Alias(anchor) => {
                return self.anchors.get(&anchor).cloned().ok_or_else(|| {
                    RegistryError::parse(FORMAT, "alias refers to an unknown anchor")
                });
            }
            other => {
                return Err(RegistryError::parse(
                    FORMAT,
                    format!("unexpected event {other:?}"),
                ))
            }
        };

        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }

        Ok(value)
    }

    fn scalar(&self, text: String, style: TScalarStyle, tag: Option<Tag>) -> Result<Value> {
        match tag {
            None if style == TScalarStyle::Plain => Ok(plain_scalar(text)),
            None => Ok(Value::String(text)),
            Some(tag) if is_string_tag(&tag) => Ok(Value::String(text)),
            Some(tag) if tag.handle == "!" && tag.suffix == INCLUDE_TAG => {
                include(&text, self.include_root)
            }
            Some(tag) => Err(RegistryError::parse(
                FORMAT,
                format!("unsupported tag {}{}", tag.handle, tag.suffix),
            )),
        }
    }

    fn sequence(&mut self) -> Result<Value> {
        let mut values = Vec::new();

        loop {
            match self.next_event()? {
                Event::SequenceEnd => return Ok(Value::Sequence(values)),
                event => values.push(self.node(event)?),
            }
        }
    }

    fn mapping(&mut self) -> Result<Value> {
        let mut mapping = Mapping::new();

        loop {
            let key = match self.next_event()? {
                Event::MappingEnd => return Ok(Value::Mapping(mapping)),
                event => convert_key(self.node(event)?)?,
            };

            let event = self.next_event()?;
            let value = self.node(event)?;

            if mapping.contains_key(&key) {
                return Err(RegistryError::parse(
                    FORMAT,
                    format!("duplicate mapping key {key}"),
                ));
            }
            mapping.insert(key, value);
        }
    }
}

fn is_string_tag(tag: &Tag) -> bool {
    tag.suffix == STRING_TAG
        && (tag.handle == "!" || CORE_SCHEMA_HANDLES.contains(&tag.handle.as_str()))
}

fn reject_container_tag(tag: Option<Tag>) -> Result<()> {
    match tag {
        Some(tag) => Err(RegistryError::parse(
            FORMAT,
            format!("unsupported tag {}{} on a collection", tag.handle, tag.suffix),
        )),
        None => Ok(()),
    }
}

fn convert_key(key: Value) -> Result<Key> {
    let unsupported = |key: String, found: &'static str| {
        Err(RegistryError::UnsupportedKeyType { key, found })
    };

    match key {
        Value::String(text) => Ok(Key::String(text)),
        Value::Integer(integer) => Ok(Key::Integer(integer)),
        Value::Float(float) => Ok(Key::Float(float)),
        Value::Date(date) => Ok(Key::Date(date)),
        Value::DateTime(datetime) => Ok(Key::DateTime(datetime)),
        Value::Boolean(flag) => unsupported(flag.to_string(), "boolean"),
        Value::Null => unsupported("null".to_string(), "null"),
        Value::Sequence(_) => unsupported("[...]".to_string(), "sequence"),
        Value::Mapping(_) => unsupported("{...}".to_string(), "mapping"),
    }
}


/// Resolves an untagged plain scalar: null, boolean, integer, float,
/// timestamp, or otherwise a string.
fn plain_scalar(text: String) -> Value {
    match text.as_str() {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Boolean(true),
        "false" | "False" | "FALSE" => return Value::Boolean(false),
        _ => {}
    }

    if let Some(integer) = parse_integer(&text) {
        return Value::Integer(integer);
    }
    if let Some(float) = parse_float(&text) {
        return Value::Float(float);
    }
    if let Some(date) = parse_iso_date(&text) {
        return Value::Date(date);
    }
    if let Some(datetime) = parse_timestamp(&text) {
        return Value::DateTime(datetime);
    }

    Value::String(text)
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hexadecimal) = text.strip_prefix("0x") {
        return i64::from_str_radix(hexadecimal, 16).ok();
    }
    if let Some(octal) = text.strip_prefix("0o") {
        return i64::from_str_radix(octal, 8).ok();
    }

    let digits = text.strip_prefix(SIGNS).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    text.parse().ok()
}

/// `[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?` and the special values.
fn parse_float(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }

    let unsigned = text.strip_prefix(SIGNS).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(&['e', 'E'][..]) {
        Some(position) => (&unsigned[..position], Some(&unsigned[position + 1..])),
        None => (unsigned, None),
    };

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    if let Some(exponent) = exponent {
        let exponent_digits = exponent.strip_prefix(SIGNS).unwrap_or(exponent);
        if exponent_digits.is_empty() || !all_digits(exponent_digits) {
            return None;
        }
    }

    text.parse().ok()
}

/// Splits `min..=max` leading ASCII digits off `text`.
fn leading_number(text: &str, min: usize, max: usize) -> Option<(u32, &str)> {
    let count = text
        .bytes()
        .take(max)
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if count < min {
        return None;
    }

    let (number, rest) = text.split_at(count);
    Some((number.parse().ok()?, rest))
}

/// The YAML timestamp grammar with a time part, for example
/// `2001-12-14t21:59:43.10-05:00` or `2001-12-14 21:59:43.10 Z`.
/// Seconds are required. Offsets are folded into the time, which is then UTC.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let (year, rest) = leading_number(text, 4, 4)?;
    let (month, rest) = leading_number(rest.strip_prefix('-')?, 1, 2)?;
    let (day, rest) = leading_number(rest.strip_prefix('-')?, 1, 2)?;

    let rest = match rest.strip_prefix(&['T', 't'][..]) {
        Some(rest) => rest,
        None => {
            let trimmed = rest.trim_start_matches(BLANKS);
            if trimmed.len() == rest.len() {
                return None;
            }
            trimmed
        }
    };

    let (hour, rest) = leading_number(rest, 1, 2)?;
    let (minute, rest) = leading_number(rest.strip_prefix(':')?, 2, 2)?;
    let (second, rest) = leading_number(rest.strip_prefix(':')?, 2, 2)?;

    let (nanosecond, rest) = match rest.strip_prefix('.') {
        Some(fraction) => {
            let count = fraction.bytes().take_while(|byte| byte.is_ascii_digit()).count();
            if count == 0 {
                return None;
            }
            let (digits, rest) = fraction.split_at(count);
            let padded: String = digits.chars().chain(std::iter::repeat('0')).take(9).collect();
            (padded.parse().ok()?, rest)
        }
        None => (0, rest),
    };

    let local = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?
        .and_hms_nano_opt(hour, minute, second, nanosecond)?;

    let zone = rest.trim_start_matches(BLANKS);
    let offset_seconds = match zone {
        "" | "Z" => 0,
        _ => {
            let (sign, zone) = match zone.strip_prefix('-') {
                Some(zone) => (-1, zone),
                None => (1, zone.strip_prefix('+')?),
            };
            let (hours, zone) = leading_number(zone, 1, 2)?;
            let (minutes, zone) = match zone.strip_prefix(':') {
                Some(zone) => leading_number(zone, 2, 2)?,
                None => (0, zone),
            };
            if !zone.is_empty() {
                return None;
            }
            sign * (i64::from(hours) * 3600 + i64::from(minutes) * 60)
        }
    };

    local.checked_sub_signed(Duration::seconds(offset_seconds))
}


/// Strings that would be read back as another type are tagged `!str`.
fn render_string(text: &str) -> YamlValue {
    let plain = YamlValue::String(text.to_string());

    match plain_scalar(text.to_string()) {
        Value::String(_) => plain,
        _ => YamlValue::Tagged(Box::new(TaggedValue {
            tag: YamlTag::new(STRING_TAG),
            value: plain,
        })),
    }
}

fn render_key(key: &Key) -> YamlValue {
    match key {
        Key::String(text) => render_string(text),
        Key::Integer(integer) => YamlValue::Number(Number::from(*integer)),
        Key::Float(float) => YamlValue::Number(Number::from(*float)),
        Key::Date(_) | Key::DateTime(_) => YamlValue::String(key.to_string()),
    }
}

fn render_value(value: &Value) -> YamlValue {
    match value {
        Value::Null => YamlValue::Null,
        Value::Boolean(flag) => YamlValue::Bool(*flag),
        Value::Integer(integer) => YamlValue::Number(Number::from(*integer)),
        Value::Float(float) => YamlValue::Number(Number::from(*float)),
        Value::String(text) => render_string(text),
        Value::Date(_) | Value::DateTime(_) => YamlValue::String(value.to_string()),
        Value::Sequence(values) => YamlValue::Sequence(values.iter().map(render_value).collect()),
        Value::Mapping(mapping) => {
            let mut entries = YamlMapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                entries.insert(render_key(key), render_value(value));
            }
            YamlValue::Mapping(entries)
        }
    }
}

pub(super) fn render(value: &Value) -> Result<String, String> {
    serde_yaml::to_string(&render_value(value)).map_err(|error| error.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::midnight;

    fn parse_text(text: &str) -> Result<Value> {
        parse(text, Path::new("."))
    }

    fn at(year: i32, month: u32, day: u32, hms: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hms.0, hms.1, hms.2)
            .unwrap()
    }

    #[test]
    fn reads_typed_scalars_and_keys() {
        let tree = parse_text(
            "vis:\n  2020-10-20:\n    350.0: [1, 2.5, yes, ~, true, 0x1F]\n  when: 2021-03-09 10:00:00\n",
        )
        .unwrap();

        let vis = tree.as_mapping().unwrap()[&Key::from("vis")].as_mapping().unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 10, 20).unwrap();

        let by_date = vis[&Key::Date(day)].as_mapping().unwrap();
        assert_eq!(
            by_date[&Key::Float(350.0)],
            Value::Sequence(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("yes".to_string()),
                Value::Null,
                Value::Boolean(true),
                Value::Integer(31),
            ])
        );
        assert_eq!(vis[&Key::from("when")], Value::DateTime(at(2021, 3, 9, (10, 0, 0))));
        assert!(!vis.contains_key(&Key::DateTime(midnight(day))));
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let tree = parse_text(
            "name: a\n\"2020-10-20\": b\nday: '2020-10-20'\nstamp: \"2020-10-20T14:30:15+02:00\"\ncount: '12'\n",
        )
        .unwrap();
        let mapping = tree.as_mapping().unwrap();

        assert_eq!(mapping[&Key::from("2020-10-20")], Value::from("b"));
        assert_eq!(mapping[&Key::from("day")], Value::from("2020-10-20"));
        assert_eq!(
            mapping[&Key::from("stamp")],
            Value::from("2020-10-20T14:30:15+02:00")
        );
        assert_eq!(mapping[&Key::from("count")], Value::from("12"));
    }

    #[test]
    fn plain_timestamps_follow_the_yaml_grammar() {
        assert_eq!(
            plain_scalar("2020-10-20T14:30:15+02:00".to_string()),
            Value::DateTime(at(2020, 10, 20, (12, 30, 15)))
        );
        assert_eq!(
            plain_scalar("2001-12-14 21:59:43.10 -5".to_string()),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2001, 12, 15)
                    .unwrap()
                    .and_hms_milli_opt(2, 59, 43, 100)
                    .unwrap()
            )
        );
        assert_eq!(
            plain_scalar("2020-10-20t01:02:03Z".to_string()),
            Value::DateTime(at(2020, 10, 20, (1, 2, 3)))
        );

        // Seconds are required, and single-digit dates are not a date-only form.
        assert_eq!(
            plain_scalar("2020-10-20 12:30".to_string()),
            Value::from("2020-10-20 12:30")
        );
        assert_eq!(plain_scalar("2020-1-2".to_string()), Value::from("2020-1-2"));
        assert_eq!(plain_scalar("1.2.3".to_string()), Value::from("1.2.3"));
        assert_eq!(plain_scalar("1e5".to_string()), Value::Float(100000.0));
    }

    #[test]
    fn anchors_and_aliases_are_expanded() {
        let tree = parse_text("base: &base [1, 2]\ncopy: *base\n").unwrap();
        let mapping = tree.as_mapping().unwrap();

        assert_eq!(mapping[&Key::from("copy")], mapping[&Key::from("base")]);
    }

    #[test]
    fn rejects_unsupported_keys_and_tags() {
        assert!(matches!(
            parse_text("true: 1\n"),
            Err(RegistryError::UnsupportedKeyType { found: "boolean", .. })
        ));
        assert!(matches!(
            parse_text("a: !secret value\n"),
            Err(RegistryError::Parse { .. })
        ));
        assert!(matches!(
            parse_text("a: [unclosed\n"),
            Err(RegistryError::Parse { .. })
        ));
        assert!(matches!(
            parse_text("a: 1\na: 2\n"),
            Err(RegistryError::Parse { .. })
        ));
    }

    #[test]
    fn empty_documents_are_null() {
        assert_eq!(parse_text("").unwrap(), Value::Null);
    }

    #[test]
    fn rendered_documents_keep_dates_and_date_like_strings_apart() {
        let mut mapping = Mapping::new();
        mapping.insert(
            Key::from("day"),
            Value::Date(NaiveDate::from_ymd_opt(2020, 10, 20).unwrap()),
        );
        mapping.insert(Key::from("label"), Value::from("2020-10-20"));
        mapping.insert(Key::from("stamp"), Value::from("2020-10-20T14:30:15+02:00"));
        mapping.insert(Key::from("count"), Value::from("12"));

        let text = render(&Value::Mapping(mapping.clone())).unwrap();
        assert_eq!(parse_text(&text).unwrap(), Value::Mapping(mapping));
    }
}
