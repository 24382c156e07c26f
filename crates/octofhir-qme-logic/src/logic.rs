//! Measure logic document: category criteria plus parameter declarations

use crate::criterion::Criterion;
use crate::error::ParseError;
use crate::parser::parse_criterion;
use octofhir_qme_types::{Category, ParameterValues};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a measure parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    List,
    #[default]
    Any,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::Boolean => "boolean",
            ParameterType::Integer => "integer",
            ParameterType::Decimal => "decimal",
            ParameterType::String => "string",
            ParameterType::Date => "date",
            ParameterType::List => "list",
            ParameterType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A parameter the measure logic expects at evaluation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterType,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Used when the caller supplies no value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn default_required() -> bool {
    true
}

impl ParameterDecl {
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Which records the exclusions criterion is evaluated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionScope {
    /// Only records in the population
    #[default]
    Population,
    /// Every record in the corpus
    AllRecords,
}

/// A criterion written either as text or as a JSON tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionSource {
    Text(String),
    Tree(Criterion),
}

impl CriterionSource {
    /// Parse text sources; trees are returned as-is
    pub fn resolve(&self) -> Result<Criterion, ParseError> {
        match self {
            CriterionSource::Text(text) => parse_criterion(text),
            CriterionSource::Tree(tree) => Ok(tree.clone()),
        }
    }
}

impl From<&str> for CriterionSource {
    fn from(text: &str) -> Self {
        CriterionSource::Text(text.to_string())
    }
}

impl From<Criterion> for CriterionSource {
    fn from(tree: Criterion) -> Self {
        CriterionSource::Tree(tree)
    }
}

/// The `logic` payload of a measure definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureLogic {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDecl>,
    pub population: CriterionSource,
    /// Defaults to the whole population
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<CriterionSource>,
    pub numerator: CriterionSource,
    /// Defaults to no exclusions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<CriterionSource>,
    /// Defaults to denominator records outside the numerator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antinumerator: Option<CriterionSource>,
    #[serde(default)]
    pub exclusion_scope: ExclusionScope,
}

impl MeasureLogic {
    /// Logic with the two mandatory criteria
    pub fn new(population: impl Into<CriterionSource>, numerator: impl Into<CriterionSource>) -> Self {
        Self {
            parameters: Vec::new(),
            population: population.into(),
            denominator: None,
            numerator: numerator.into(),
            exclusions: None,
            antinumerator: None,
            exclusion_scope: ExclusionScope::default(),
        }
    }

    pub fn with_denominator(mut self, source: impl Into<CriterionSource>) -> Self {
        self.denominator = Some(source.into());
        self
    }

    pub fn with_exclusions(mut self, source: impl Into<CriterionSource>) -> Self {
        self.exclusions = Some(source.into());
        self
    }

    pub fn with_antinumerator(mut self, source: impl Into<CriterionSource>) -> Self {
        self.antinumerator = Some(source.into());
        self
    }

    pub fn with_exclusion_scope(mut self, scope: ExclusionScope) -> Self {
        self.exclusion_scope = scope;
        self
    }

    pub fn with_parameter(mut self, decl: ParameterDecl) -> Self {
        self.parameters.push(decl);
        self
    }

    /// The criterion source for a category, if the measure defines one
    pub fn source(&self, category: Category) -> Option<&CriterionSource> {
        match category {
            Category::Population => Some(&self.population),
            Category::Denominator => self.denominator.as_ref(),
            Category::Numerator => Some(&self.numerator),
            Category::Antinumerator => self.antinumerator.as_ref(),
            Category::Exclusions => self.exclusions.as_ref(),
        }
    }

    /// Parameter declaration by name, matched like [`ParameterValues`] keys
    pub fn parameter(&self, name: &str) -> Option<&ParameterDecl> {
        let key = ParameterValues::normalize_key(name);
        self.parameters
            .iter()
            .find(|p| ParameterValues::normalize_key(&p.name) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_with_defaults() {
        let logic: MeasureLogic = serde_json::from_value(json!({
            "population": "age >= 18",
            "numerator": {"field": "has_diagnosis_x"}
        }))
        .unwrap();

        assert!(matches!(logic.population, CriterionSource::Text(_)));
        assert!(matches!(logic.numerator, CriterionSource::Tree(_)));
        assert!(logic.denominator.is_none());
        assert_eq!(logic.exclusion_scope, ExclusionScope::Population);
        assert!(logic.source(Category::Exclusions).is_none());
    }

    #[test]
    fn test_parameter_defaults() {
        let decl: ParameterDecl = serde_json::from_value(json!({"name": "effective_date"})).unwrap();
        assert_eq!(decl.kind, ParameterType::Any);
        assert!(decl.required);
        assert!(decl.default.is_none());
    }

    #[test]
    fn test_parameter_lookup_is_case_insensitive() {
        let logic = MeasureLogic::new("true", "true")
            .with_parameter(ParameterDecl::new("Effective_Date", ParameterType::Date));
        assert!(logic.parameter("effective_date").is_some());
        assert!(logic.parameter(":EFFECTIVE_DATE").is_some());
        assert!(logic.parameter("other").is_none());
    }

    #[test]
    fn test_parameter_lookup_matches_value_keys() {
        let logic = MeasureLogic::new("true", "true")
            .with_parameter(ParameterDecl::new(" Größe ", ParameterType::Decimal));
        assert!(logic.parameter(" :GRÖßE ").is_some());
        assert!(logic.parameter("größe").is_some());
    }

    #[test]
    fn test_missing_numerator_is_rejected() {
        let result: Result<MeasureLogic, _> =
            serde_json::from_value(json!({"population": "true"}));
        assert!(result.is_err());
    }
}
