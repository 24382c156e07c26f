//! Measure definitions

use crate::error::ModelError;
use octofhir_qme_logic::MeasureLogic;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Unique key of a stored measure
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasureKey {
    pub id: String,
    pub sub_id: Option<String>,
}

impl MeasureKey {
    pub fn new(id: impl Into<String>, sub_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            sub_id: sub_id.map(str::to_string),
        }
    }
}

impl fmt::Display for MeasureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_id {
            Some(sub_id) => write!(f, "{}/{}", self.id, sub_id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A quality measure: descriptive metadata plus the criteria logic.
///
/// Measures with several numerator/denominator pairs are stored as variants
/// sharing `id` and differing in `sub_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub steward: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Bundle the measure was loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    pub logic: MeasureLogic,
}

impl MeasureDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, logic: MeasureLogic) -> Self {
        Self {
            id: id.into(),
            sub_id: None,
            name: name.into(),
            subtitle: None,
            steward: String::new(),
            description: String::new(),
            category: String::new(),
            bundle: None,
            logic,
        }
    }

    /// Turn this definition into a named variant
    pub fn with_variant(mut self, sub_id: impl Into<String>, subtitle: impl Into<String>) -> Self {
        self.sub_id = Some(sub_id.into());
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_steward(mut self, steward: impl Into<String>) -> Self {
        self.steward = steward.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn key(&self) -> MeasureKey {
        MeasureKey::new(self.id.clone(), self.sub_id.as_deref())
    }

    /// Exact (id, sub_id) match
    pub fn is(&self, id: &str, sub_id: Option<&str>) -> bool {
        self.id == id && self.sub_id.as_deref() == sub_id
    }

    /// Check the structural invariants a loaded definition must satisfy
    pub fn validate(&self) -> Result<(), ModelError> {
        let key = self.key().to_string();
        if self.id.trim().is_empty() {
            return Err(ModelError::invalid_definition(key, "id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid_definition(key, "name must not be empty"));
        }
        if matches!(&self.sub_id, Some(sub_id) if sub_id.trim().is_empty()) {
            return Err(ModelError::invalid_definition(
                key,
                "sub_id must not be empty when present",
            ));
        }

        let mut seen = HashSet::new();
        for parameter in &self.logic.parameters {
            let name = parameter.name.trim();
            if name.is_empty() {
                return Err(ModelError::invalid_definition(key, "parameter name must not be empty"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ModelError::invalid_definition(
                    key,
                    format!("parameter '{}' is declared more than once", name),
                ));
            }
        }

        Ok(())
    }
}
