//! Load-time normalization and validation of mapping keys.
//!
//! Every loaded tree passes through [`normalize_and_validate`] before any key
//! can be looked up. The pass has two observable steps:
//!
//! 1. **Normalization** rewrites every date key into a datetime key at
//!    midnight of the same day. The tree is modified in place and the
//!    rewritten keys keep their position in the mapping.
//! 2. **Validation** checks that all keys of each mapping share one
//!    [`KeyKind`]. Every violation in the tree is collected and reported
//!    at once.

use tracing::warn;

use crate::error::{KeyTypeViolation, RegistryError, Result};
use crate::value::{midnight, Key, Value};


const ROOT_LOCATION: &str = "<root>";


/// Normalizes date keys and then checks key-type homogeneity of the whole tree.
pub fn normalize_and_validate(tree: &mut Value) -> Result<()> {
    normalize_date_keys(tree);

    let mut violations = Vec::new();
    collect_violations(tree, ROOT_LOCATION, &mut violations);

    if violations.is_empty() {
        return Ok(());
    }

    for violation in &violations {
        warn!("Configuration key type error: {}.", violation);
    }

    Err(RegistryError::KeyType { violations })
}


/// Rewrites every [`Key::Date`] in the tree into a [`Key::DateTime`] at midnight.
pub fn normalize_date_keys(value: &mut Value) {
    match value {
        Value::Mapping(mapping) => {
            if mapping.keys().any(|key| matches!(key, Key::Date(_))) {
                let entries = std::mem::take(mapping);

                *mapping = entries
                    .into_iter()
                    .map(|(key, child)| match key {
                        Key::Date(date) => (Key::DateTime(midnight(date)), child),
                        other => (other, child),
                    })
                    .collect();
            }

            for child in mapping.values_mut() {
                normalize_date_keys(child);
            }
        }
        Value::Sequence(values) => {
            for child in values {
                normalize_date_keys(child);
            }
        }
        _ => {}
    }
}


fn child_location(parent: &str, child: &dyn std::fmt::Display) -> String {
    if parent == ROOT_LOCATION {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

fn collect_violations(value: &Value, location: &str, violations: &mut Vec<KeyTypeViolation>) {
    match value {
        Value::Mapping(mapping) => {
            if let Some(reference_key) = mapping.keys().next() {
                let expected = reference_key.kind();

                violations.extend(
                    mapping
                        .keys()
                        .filter(|key| key.kind() != expected)
                        .map(|key| KeyTypeViolation {
                            location: location.to_string(),
                            key: key.to_string(),
                            found: key.kind(),
                            expected,
                        }),
                );
            }

            for (key, child) in mapping {
                collect_violations(child, &child_location(location, key), violations);
            }
        }
        Value::Sequence(values) => {
            for (index, child) in values.iter().enumerate() {
                collect_violations(child, &child_location(location, &index), violations);
            }
        }
        _ => {}
    }
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::value::{KeyKind, Mapping};

    fn mapping(entries: Vec<(Key, Value)>) -> Value {
        Value::Mapping(entries.into_iter().collect::<Mapping>())
    }

    #[test]
    fn accepts_homogeneous_keys() {
        let mut tree = mapping(vec![
            (Key::from("a"), Value::Integer(1)),
            (
                Key::from("b"),
                mapping(vec![
                    (Key::Float(350.0), Value::from("x")),
                    (Key::Float(300.0), Value::from("y")),
                ]),
            ),
        ]);

        assert!(normalize_and_validate(&mut tree).is_ok());
    }

    #[test]
    fn rejects_string_and_integer_keys_at_one_level() {
        let mut tree = mapping(vec![
            (Key::from("name"), Value::Integer(1)),
            (Key::Integer(2), Value::Integer(2)),
        ]);

        let Err(RegistryError::KeyType { violations }) = normalize_and_validate(&mut tree) else {
            panic!("expected a key type error");
        };

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].key, "2");
        assert_eq!(violations[0].found, KeyKind::Integer);
        assert_eq!(violations[0].expected, KeyKind::String);
        assert_eq!(violations[0].location, ROOT_LOCATION);
    }

    #[test]
    fn reports_violations_from_every_level() {
        let nested = mapping(vec![
            (Key::Integer(1), Value::Null),
            (Key::Float(1.5), Value::Null),
        ]);
        let mut tree = mapping(vec![
            (Key::from("outer"), Value::Sequence(vec![nested])),
            (Key::Integer(7), Value::Null),
        ]);

        let Err(RegistryError::KeyType { violations }) = normalize_and_validate(&mut tree) else {
            panic!("expected a key type error");
        };

        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.location == "outer/0" && v.key == "1.5"));
    }

    #[test]
    fn rewrites_date_keys_to_midnight_datetimes() {
        let day = NaiveDate::from_ymd_opt(2020, 10, 20).unwrap();
        let later = NaiveDate::from_ymd_opt(2021, 3, 9).unwrap();
        let mut tree = mapping(vec![
            (Key::Date(day), Value::Integer(1)),
            (Key::DateTime(later.and_hms_opt(6, 0, 0).unwrap()), Value::Integer(2)),
        ]);

        normalize_and_validate(&mut tree).unwrap();

        let keys: Vec<&Key> = tree.as_mapping().unwrap().keys().collect();
        assert_eq!(keys[0], &Key::DateTime(midnight(day)));
        assert_eq!(keys[1].kind(), KeyKind::DateTime);
    }
}
