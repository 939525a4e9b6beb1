//! Value model shared by every cache backend.
//!
//! [`Value`] is the typed scalar bound to SQL parameters and read back from
//! result rows. [`CacheValue`] is what callers store. [`Key`] addresses a row
//! (or a scope) and is normalized into a tuple of unique-column values.

use crate::error::{CacheError, Result};
use indexmap::IndexMap;
use std::fmt;

/// A single typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays and objects are rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Integer(i64::from(b))),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Real(f))
                } else {
                    Err(CacheError::invalid_value(format!("number out of range: {}", n)))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            other => Err(CacheError::invalid_value(format!(
                "expected a scalar, got {}",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Blob(b) => serde_json::Value::from(b.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(i64::from(b))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Column name to value mapping, in column order.
pub type Row = IndexMap<String, Value>;

/// A value stored in a cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Scalar(Value),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Map(Row),
}

impl CacheValue {
    /// Build a map value from `(column, value)` pairs.
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        CacheValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_map(&self) -> Option<&Row> {
        match self {
            CacheValue::Map(row) => Some(row),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheValue::Scalar(_) => "scalar",
            CacheValue::Tuple(_) => "tuple",
            CacheValue::List(_) => "list",
            CacheValue::Map(_) => "map",
        }
    }

    /// Convert from JSON: objects become maps, arrays lists, the rest scalars.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(obj) => obj
                .into_iter()
                .map(|(k, v)| Ok((k, Value::from_json(v)?)))
                .collect::<Result<Row>>()
                .map(CacheValue::Map),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>>>()
                .map(CacheValue::List),
            scalar => Value::from_json(scalar).map(CacheValue::Scalar),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CacheValue::Scalar(v) => v.to_json(),
            CacheValue::Tuple(items) | CacheValue::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            CacheValue::Map(row) => serde_json::Value::Object(
                row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

macro_rules! scalar_cache_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CacheValue {
                fn from(v: $ty) -> Self {
                    CacheValue::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_cache_value!(Value, &str, String, i64, i32, u32, bool, f64, Vec<u8>);

impl From<Row> for CacheValue {
    fn from(row: Row) -> Self {
        CacheValue::Map(row)
    }
}

/// Row or scope identifier: a scalar or a fixed-length tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Single(Value),
    Composite(Vec<Value>),
}

impl Key {
    /// Normalize into a tuple of exactly `arity` values.
    ///
    /// `what` names the argument ("key" or "scope") in errors.
    pub fn to_tuple(&self, arity: usize, what: &'static str) -> Result<Vec<Value>> {
        match self {
            Key::Single(Value::Null) => Err(CacheError::MissingArgument(what)),
            Key::Single(v) if arity == 1 => Ok(vec![v.clone()]),
            Key::Single(_) => Err(CacheError::KeyArity {
                what,
                expected: arity,
                actual: 1,
            }),
            Key::Composite(values) if values.len() == arity => Ok(values.clone()),
            Key::Composite(values) => Err(CacheError::KeyArity {
                what,
                expected: arity,
                actual: values.len(),
            }),
        }
    }

    /// Inverse of [`Key::to_tuple`]: one value stays scalar.
    pub fn from_tuple(mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            Key::Single(values.remove(0))
        } else {
            Key::Composite(values)
        }
    }

    /// Text form of a single-valued key, used as a scope or table name.
    pub fn as_name(&self) -> Option<String> {
        match self {
            Key::Single(Value::Text(s)) => Some(s.clone()),
            Key::Single(Value::Integer(i)) => Some(i.to_string()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Key::Single(v) => v.to_json(),
            Key::Composite(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Single(v) => write!(f, "{}", v),
            Key::Composite(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<Value> for Key {
    fn from(v: Value) -> Self {
        Key::Single(v)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Single(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Single(s.into())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Single(i.into())
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Single(i.into())
    }
}

impl From<Vec<Value>> for Key {
    fn from(values: Vec<Value>) -> Self {
        Key::Composite(values)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key::Composite(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Key::Composite(vec![a.into(), b.into(), c.into()])
    }
}
