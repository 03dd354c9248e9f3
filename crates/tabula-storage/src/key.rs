//! Record keys
//!
//! A key is read out of a record through the collection's key path. Only
//! finite numbers and strings are valid keys; numbers sort before strings
//! and strings compare by UTF-16 code units.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::error::StorageError;
use crate::Result;

const TYPE_NUMBER: i64 = 0;
const TYPE_TEXT: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(f64),
    Text(String),
}

impl Key {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().filter(|n| n.is_finite()).map(Key::Number),
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Resolve a dotted key path such as `"id"` or `"meta.id"` against a record.
    pub fn extract(record: &Value, key_path: &str) -> Result<Self> {
        validate_key_path(key_path)?;

        key_path
            .split('.')
            .try_fold(record, |node, segment| node.get(segment))
            .and_then(Key::from_value)
            .ok_or_else(|| StorageError::MissingKey {
                key_path: key_path.to_string(),
            })
    }

    /// Column triple used by the `records` table: (type, number, text)
    pub(crate) fn columns(&self) -> (i64, f64, &str) {
        match self {
            Key::Number(n) => (TYPE_NUMBER, *n, ""),
            Key::Text(s) => (TYPE_TEXT, 0.0, s.as_str()),
        }
    }
}

pub(crate) fn validate_key_path(key_path: &str) -> Result<()> {
    if key_path.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(StorageError::InvalidKeyPath(key_path.to_string()));
    }
    Ok(())
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => a.partial_cmp(b),
            (Key::Number(_), Key::Text(_)) => Some(Ordering::Less),
            (Key::Text(_), Key::Number(_)) => Some(Ordering::Greater),
            (Key::Text(a), Key::Text(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                write!(f, "{}", *n as i64)
            }
            Key::Number(n) => write!(f, "{n}"),
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Number(value as f64)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Number(f64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Number(f64::from(value))
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Number(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}
