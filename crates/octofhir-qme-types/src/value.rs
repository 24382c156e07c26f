//! Runtime values for criteria evaluation
//!
//! `QmeValue` is what a criterion evaluates to. Record fields are JSON documents
//! and are converted lazily on access; parameter values are coerced once at
//! compile time.

use crate::error::{ValueError, ValueResult};
use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Date format accepted for string-encoded dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A value produced while evaluating a measure criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum QmeValue {
    /// Missing or unknown
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    /// Calendar date (no time component)
    Date(NaiveDate),
    List(Vec<QmeValue>),
    /// Nested record structure, insertion ordered
    Object(IndexMap<String, QmeValue>),
}

impl QmeValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is `true`
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Boolean(true))
    }

    /// Check if this value is `false`
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Boolean(false))
    }

    /// Name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::List(_) => "List",
            Self::Object(_) => "Object",
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as Decimal (integers are promoted)
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as Date, parsing ISO `YYYY-MM-DD` strings
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::String(s) => parse_date(s).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[QmeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, QmeValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a JSON value into a runtime value.
    ///
    /// Strings stay strings even when they look like dates; date comparison
    /// parses them on demand.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Decimal::from_str(&n.to_string())
                        .ok()
                        .or_else(|| n.as_f64().and_then(Decimal::from_f64))
                        .map(Self::Decimal)
                        .unwrap_or(Self::Null)
                }
            }
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into JSON (dates render as ISO strings, decimals as numbers)
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Integer(i) => JsonValue::from(*i),
            // a JSON number, so `from_json` reads it back as a number
            Self::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(d.to_string())),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Ordering comparison with null propagation.
    ///
    /// Returns `Ok(None)` when either side is null. Numbers compare across
    /// Integer/Decimal, dates compare against ISO strings. Anything else that
    /// differs in type is an error.
    pub fn compare(&self, other: &Self) -> ValueResult<Option<Ordering>> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(None),
            (Self::Boolean(a), Self::Boolean(b)) => Ok(Some(a.cmp(b))),
            (Self::Integer(a), Self::Integer(b)) => Ok(Some(a.cmp(b))),
            (Self::Integer(_) | Self::Decimal(_), Self::Integer(_) | Self::Decimal(_)) => {
                // both arms are numeric, as_decimal cannot fail here
                let a = self.as_decimal().unwrap_or_default();
                let b = other.as_decimal().unwrap_or_default();
                Ok(Some(a.cmp(&b)))
            }
            (Self::String(a), Self::String(b)) => Ok(Some(a.cmp(b))),
            (Self::Date(a), Self::Date(b)) => Ok(Some(a.cmp(b))),
            (Self::Date(a), Self::String(s)) => Ok(Some(a.cmp(&parse_date(s)?))),
            (Self::String(s), Self::Date(b)) => Ok(Some(parse_date(s)?.cmp(b))),
            _ => Err(ValueError::incomparable(self.type_name(), other.type_name())),
        }
    }

    /// Equality with null propagation.
    ///
    /// Values of unrelated types are simply unequal.
    pub fn equals(&self, other: &Self) -> ValueResult<Option<bool>> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(None),
            (Self::List(a), Self::List(b)) => {
                if a.len() != b.len() {
                    return Ok(Some(false));
                }
                let mut result = Some(true);
                for (x, y) in a.iter().zip(b) {
                    match x.equals(y)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            (Self::Object(_), Self::Object(_)) => Ok(Some(self == other)),
            _ => match self.compare(other) {
                Ok(ordering) => Ok(ordering.map(|o| o == Ordering::Equal)),
                Err(ValueError::InvalidDate { .. }) | Err(ValueError::Incomparable { .. }) => {
                    Ok(Some(false))
                }
                Err(e) => Err(e),
            },
        }
    }
}

/// Parse an ISO `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> ValueResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| ValueError::invalid_date(s))
}

impl fmt::Display for QmeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Date(d) => write!(f, "@{}", d.format(DATE_FORMAT)),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl PartialEq for QmeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            // Cross-type numeric comparisons
            (Self::Integer(a), Self::Decimal(b)) => Decimal::from(*a) == *b,
            (Self::Decimal(a), Self::Integer(b)) => *a == Decimal::from(*b),
            _ => false,
        }
    }
}

impl From<bool> for QmeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for QmeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for QmeValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for QmeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QmeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for QmeValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}
