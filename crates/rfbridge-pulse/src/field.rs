use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded or to-be-encoded field value.
///
/// Serializes untagged, so a decoded event renders as plain JSON
/// (`{"unit": 4, "state": true}`) and the same JSON shape is accepted on
/// the encode path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean field.
    Flag(bool),
    /// Unsigned field.
    Number(u64),
    /// Enum field, carried by variant symbol.
    Symbol(String),
}

impl FieldValue {
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            FieldValue::Symbol(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(v) => write!(f, "{v}"),
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Symbol(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Symbol(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Symbol(v)
    }
}
