use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structured script value.
///
/// Values flow in both directions across the context boundary: host-call
/// parameters travel upward inside an `ApiRequest`, and the game
/// collaborator's answers travel back down and are fed to the suspended
/// interpreter. Map values carry structured host results such as the
/// `{ position, flag }` record returned by `getNearestVoxels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / unit value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Heterogeneous sequence.
    List(Vec<Value>),
    /// String-keyed record.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness used by `if`/`while` conditions and logical operators.
    /// `null`, `false`, zero, and the empty string are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Int(num) => *num != 0,
            Value::Float(num) => *num != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    /// Numeric view of the value, when it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(num) => Some(*num as f64),
            Value::Float(num) => Some(*num),
            _ => None,
        }
    }

    /// String view of the value, when it has one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Short type label for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Build a map value from key/value pairs.
    pub fn map<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            // Exact for int pairs; coercion past 2^53 would conflate them.
            (Value::Int(a), Value::Int(b)) => a == b,
            // Mixed int/float compares numerically so `3 == 3.0` holds.
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(flag) => write!(f, "{}", flag),
            Value::Int(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{}", num),
            Value::Str(text) => write!(f, "{:?}", text),
            Value::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_coerces() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Str("3".into()));
    }

    #[test]
    fn int_equality_is_exact_at_64_bits() {
        assert_ne!(Value::Int(i64::MAX), Value::Int(i64::MAX - 1));
        assert_eq!(Value::Int(i64::MAX), Value::Int(i64::MAX));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::List(Vec::new()).truthy());
        assert!(Value::Float(0.5).truthy());
    }

    #[test]
    fn display_is_compact() {
        let value = Value::List(vec![Value::Int(3), Value::Int(0), Value::Int(5)]);
        assert_eq!(value.to_string(), "[3, 0, 5]");
    }

    #[test]
    fn json_maps_onto_the_untagged_representation() {
        let value: Value =
            serde_json::from_str(r#"{"position": [3, 0, 5], "flag": true}"#).expect("decodes");
        assert_eq!(
            value,
            Value::map([
                (
                    "position",
                    Value::List(vec![Value::Int(3), Value::Int(0), Value::Int(5)]),
                ),
                ("flag", Value::Bool(true)),
            ])
        );
        assert_eq!(
            serde_json::to_string(&Value::Float(1.5)).expect("encodes"),
            "1.5"
        );
    }
}
