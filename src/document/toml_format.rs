use toml::value::Datetime;

use crate::error::{RegistryError, Result};
use crate::value::{parse_iso_date, parse_iso_datetime, Key, Mapping, Value};


const FORMAT: &str = "TOML";


pub(super) fn parse(text: &str) -> Result<Value> {
    let table: toml::Table =
        toml::from_str(text).map_err(|error| RegistryError::parse(FORMAT, error))?;

    Ok(convert_value(toml::Value::Table(table)))
}

/// Local times have no date part and are kept as text.
fn convert_datetime(datetime: &Datetime) -> Value {
    let text = datetime.to_string();

    let converted = match (datetime.date.is_some(), datetime.time.is_some()) {
        (true, false) => parse_iso_date(&text).map(Value::Date),
        (true, true) => parse_iso_datetime(&text).map(Value::DateTime),
        _ => None,
    };

    converted.unwrap_or(Value::String(text))
}

fn convert_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(integer) => Value::Integer(integer),
        toml::Value::Float(float) => Value::Float(float),
        toml::Value::Boolean(flag) => Value::Boolean(flag),
        toml::Value::Datetime(datetime) => convert_datetime(&datetime),
        toml::Value::Array(values) => {
            Value::Sequence(values.into_iter().map(convert_value).collect())
        }
        toml::Value::Table(table) => Value::Mapping(
            table
                .into_iter()
                .map(|(key, value)| (Key::String(key), convert_value(value)))
                .collect::<Mapping>(),
        ),
    }
}


fn render_datetime(text: String) -> Result<toml::Value, String> {
    text.parse::<Datetime>()
        .map(toml::Value::Datetime)
        .map_err(|error| format!("cannot write {text} as a TOML datetime: {error}"))
}

fn render_value(value: &Value) -> Result<toml::Value, String> {
    Ok(match value {
        Value::Null => return Err("TOML cannot represent null values".to_string()),
        Value::Boolean(flag) => toml::Value::Boolean(*flag),
        Value::Integer(integer) => toml::Value::Integer(*integer),
        Value::Float(float) => toml::Value::Float(*float),
        Value::String(text) => toml::Value::String(text.clone()),
        Value::Date(_) | Value::DateTime(_) => render_datetime(value.to_string())?,
        Value::Sequence(values) => toml::Value::Array(
            values
                .iter()
                .map(render_value)
                .collect::<Result<Vec<_>, String>>()?,
        ),
        Value::Mapping(mapping) => {
            let mut table = toml::Table::new();
            for (key, value) in mapping {
                let Key::String(name) = key else {
                    return Err(format!(
                        "TOML keys must be strings, found the {} key {key}",
                        key.kind()
                    ));
                };
                table.insert(name.clone(), render_value(value)?);
            }
            toml::Value::Table(table)
        }
    })
}

pub(super) fn render(value: &Value) -> Result<String, String> {
    let toml::Value::Table(table) = render_value(value)? else {
        return Err("the root of a TOML document must be a mapping".to_string());
    };

    toml::to_string(&table).map_err(|error| error.to_string())
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn reads_native_dates() {
        let tree = parse("[vis]\nday = 2020-10-20\nat = 2020-10-20T06:30:00\nclock = 06:30:00\n")
            .unwrap();
        let vis = tree.as_mapping().unwrap()[&Key::from("vis")].as_mapping().unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 10, 20).unwrap();

        assert_eq!(vis[&Key::from("day")], Value::Date(day));
        assert_eq!(
            vis[&Key::from("at")],
            Value::DateTime(day.and_hms_opt(6, 30, 0).unwrap())
        );
        assert_eq!(vis[&Key::from("clock")], Value::String("06:30:00".to_string()));
    }

    #[test]
    fn refuses_trees_toml_cannot_hold() {
        let mut mapping = Mapping::new();
        mapping.insert(Key::Integer(1), Value::from("one"));
        assert!(render(&Value::Mapping(mapping)).is_err());

        let mut mapping = Mapping::new();
        mapping.insert(Key::from("nothing"), Value::Null);
        assert!(render(&Value::Mapping(mapping)).is_err());

        assert!(render(&Value::Integer(1)).is_err());
    }

    #[test]
    fn writes_dates_natively() {
        let mut mapping = Mapping::new();
        mapping.insert(
            Key::from("day"),
            Value::Date(NaiveDate::from_ymd_opt(2020, 10, 20).unwrap()),
        );
        let tree = Value::Mapping(mapping);

        let text = render(&tree).unwrap();
        assert!(text.contains("day = 2020-10-20"));
        assert_eq!(parse(&text).unwrap(), tree);
    }
}
