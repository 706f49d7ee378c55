//! Runtime values carried by constants and grouping keys

use crate::types::{StructField, Type};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Duration(Duration),
    List(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Tuple(Vec<Value>),
}

impl Value {
    /// The most precise type describing this value.
    ///
    /// An empty list has element type `Any`; a list with mixed elements has
    /// the union of its element types.
    pub fn ty(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Boolean(_) => Type::Boolean,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::String(_) => Type::String,
            Value::Time(_) => Type::Time,
            Value::Duration(_) => Type::Duration,
            Value::List(items) => {
                let element = Type::sum_of(items.iter().map(Value::ty)).unwrap_or(Type::Any);
                Type::List(Box::new(element))
            }
            Value::Struct(fields) => Type::Struct(
                fields
                    .iter()
                    .map(|(name, value)| StructField::new(name.clone(), value.ty()))
                    .collect(),
            ),
            Value::Tuple(items) => Type::Tuple(items.iter().map(Value::ty).collect()),
        }
    }

    /// Returns true for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Struct(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Int(1).ty(), Type::Int);
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Null]).ty(),
            Type::List(Box::new(Type::Int.nullable()))
        );
        assert_eq!(
            Value::List(Vec::new()).ty(),
            Type::List(Box::new(Type::Any))
        );
        assert_eq!(
            Value::Struct(vec![("id".into(), Value::Int(3))]).ty(),
            Type::Struct(vec![StructField::new("id", Type::Int)])
        );
    }

    #[test]
    fn test_display_escapes_strings() {
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Null]).to_string(),
            "(1, NULL)"
        );
    }

    #[test]
    fn test_json_encoding_is_stable() {
        let key = Value::Tuple(vec![Value::Int(2), Value::from("a")]);
        let first = serde_json::to_vec(&key).unwrap();
        let second = serde_json::to_vec(&key.clone()).unwrap();
        assert_eq!(first, second);
        let back: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(back, key);
    }
}
