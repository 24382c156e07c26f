//! Runtime parameter values supplied per evaluation

use crate::value::QmeValue;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

/// Parameter values keyed case-insensitively.
///
/// Callers may pass `Effective_Date`, `effective_date` or the symbol-style
/// `:effective_date`; all three address the same entry. The spelling of the
/// first insertion is kept for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValues {
    values: IndexMap<String, (String, QmeValue)>,
}

impl ParameterValues {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized lookup key for a parameter name
    pub fn normalize_key(name: &str) -> String {
        name.trim().trim_start_matches(':').to_lowercase()
    }

    /// Set a parameter value, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<QmeValue>) -> Option<QmeValue> {
        let name = name.into();
        let key = Self::normalize_key(&name);
        match self.values.get_mut(&key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value.into())),
            None => {
                self.values.insert(key, (name, value.into()));
                None
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<QmeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a parameter value
    pub fn get(&self, name: &str) -> Option<&QmeValue> {
        self.values.get(&Self::normalize_key(name)).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&Self::normalize_key(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (name as supplied, value) in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QmeValue)> {
        self.values.values().map(|(name, value)| (name.as_str(), value))
    }

    /// Build from a JSON object
    pub fn from_json(map: &Map<String, JsonValue>) -> Self {
        map.iter()
            .map(|(name, value)| (name.clone(), QmeValue::from_json(value)))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, QmeValue)> for ParameterValues {
    fn from_iter<I: IntoIterator<Item = (K, QmeValue)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
