//! Per-record classification

use crate::error::{EvalError, RecordFault};
use crate::expr::{Expr, Frame};
use octofhir_qme_logic::ExclusionScope;
use octofhir_qme_model::PatientRecord;
use octofhir_qme_types::{Category, Classification};

/// Maps one record to the categories it belongs to.
///
/// Implementations must be pure: classifying the same record twice yields
/// the same partial classification.
pub trait Classify: Send + Sync {
    fn classify(&self, record: &PatientRecord) -> Result<Classification, RecordFault>;
}

impl<F> Classify for F
where
    F: Fn(&PatientRecord) -> Result<Classification, RecordFault> + Send + Sync,
{
    fn classify(&self, record: &PatientRecord) -> Result<Classification, RecordFault> {
        self(record)
    }
}

/// Classifier compiled from a measure's logic
#[derive(Debug, Clone)]
pub struct MeasureClassifier {
    pub(crate) key: String,
    pub(crate) population: Expr,
    pub(crate) denominator: Option<Expr>,
    pub(crate) numerator: Expr,
    pub(crate) exclusions: Option<Expr>,
    pub(crate) antinumerator: Option<Expr>,
    pub(crate) exclusion_scope: ExclusionScope,
}

impl MeasureClassifier {
    pub(crate) fn with_key(mut self, key: String) -> Self {
        self.key = key;
        self
    }

    /// Key of the measure this classifier was compiled from
    pub fn measure_key(&self) -> &str {
        &self.key
    }

    pub fn exclusion_scope(&self) -> ExclusionScope {
        self.exclusion_scope
    }

    /// Categories the record belongs to, in evaluation order
    pub fn categories(&self, record: &PatientRecord) -> Result<Vec<Category>, RecordFault> {
        let fault = |e: EvalError| RecordFault::for_record(record.id(), e);
        let mut frame = Frame::new(record);

        let in_population = self.population.holds(&mut frame).map_err(fault)?;
        if in_population {
            frame.admit(Category::Population);

            let in_denominator = match &self.denominator {
                Some(expr) => expr.holds(&mut frame).map_err(fault)?,
                None => true,
            };
            if in_denominator {
                frame.admit(Category::Denominator);
                if self.numerator.holds(&mut frame).map_err(fault)? {
                    frame.admit(Category::Numerator);
                }
            }
        }

        let exclusion_gate = match self.exclusion_scope {
            ExclusionScope::Population => in_population,
            ExclusionScope::AllRecords => true,
        };
        if exclusion_gate {
            if let Some(expr) = &self.exclusions {
                if expr.holds(&mut frame).map_err(fault)? {
                    frame.admit(Category::Exclusions);
                }
            }
        }

        if frame.is_member(Category::Denominator) {
            let in_antinumerator = match &self.antinumerator {
                Some(expr) => expr.holds(&mut frame).map_err(fault)?,
                None => !frame.is_member(Category::Numerator),
            };
            if in_antinumerator {
                frame.admit(Category::Antinumerator);
            }
        }

        Ok(frame.into_members())
    }
}

impl Classify for MeasureClassifier {
    fn classify(&self, record: &PatientRecord) -> Result<Classification, RecordFault> {
        let categories = self.categories(record)?;
        Ok(Classification::of_record(record.id(), categories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CriteriaCompiler;
    use octofhir_qme_logic::MeasureLogic;
    use octofhir_qme_types::ParameterValues;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn classifier(logic: MeasureLogic) -> MeasureClassifier {
        CriteriaCompiler::new()
            .compile_logic(&logic, &ParameterValues::new())
            .unwrap()
    }

    fn record(doc: serde_json::Value) -> PatientRecord {
        PatientRecord::from_document(doc).unwrap()
    }

    #[test]
    fn test_non_population_record_is_empty() {
        let c = classifier(
            MeasureLogic::new("age >= 18", "has_diagnosis_x").with_exclusions("has_contraindication_y"),
        );
        let r = record(json!({"id": "4", "age": 12, "has_contraindication_y": true}));
        assert!(c.classify(&r).unwrap().is_empty());
    }

    #[test]
    fn test_all_records_exclusion_scope() {
        let c = classifier(
            MeasureLogic::new("age >= 18", "has_diagnosis_x")
                .with_exclusions("has_contraindication_y")
                .with_exclusion_scope(ExclusionScope::AllRecords),
        );
        let r = record(json!({"id": "4", "age": 12, "has_contraindication_y": true}));
        assert_eq!(c.categories(&r).unwrap(), vec![Category::Exclusions]);
    }

    #[test]
    fn test_default_antinumerator() {
        let c = classifier(MeasureLogic::new("age >= 18", "has_diagnosis_x"));
        let r = record(json!({"id": "1", "age": 40}));
        assert_eq!(
            c.categories(&r).unwrap(),
            vec![Category::Population, Category::Denominator, Category::Antinumerator]
        );
    }

    #[test]
    fn test_explicit_antinumerator() {
        let c = classifier(
            MeasureLogic::new("age >= 18", "has_diagnosis_x").with_antinumerator("age > 65"),
        );
        let young = record(json!({"id": "1", "age": 40}));
        let old = record(json!({"id": "2", "age": 70, "has_diagnosis_x": true}));
        assert!(!c.categories(&young).unwrap().contains(&Category::Antinumerator));
        assert!(c.categories(&old).unwrap().contains(&Category::Antinumerator));
    }

    #[test]
    fn test_null_predicate_is_non_membership() {
        let c = classifier(MeasureLogic::new("age >= 18", "has_diagnosis_x"));
        let r = record(json!({"id": "1"}));
        assert!(c.categories(&r).unwrap().is_empty());
    }

    #[test]
    fn test_incompatible_comparison_is_fault() {
        let c = classifier(MeasureLogic::new("age >= 18", "true"));
        let r = record(json!({"id": "1", "age": "adult"}));
        let fault = c.classify(&r).unwrap_err();
        assert_eq!(fault.record.as_ref().map(|id| id.as_str()), Some("1"));
    }

    #[test]
    fn test_classification_is_repeatable() {
        let c = classifier(MeasureLogic::new("age >= 18", "has_diagnosis_x"));
        let r = record(json!({"id": "1", "age": 40, "has_diagnosis_x": true}));
        assert_eq!(c.classify(&r).unwrap(), c.classify(&r).unwrap());
    }

    #[test]
    fn test_closure_classifier() {
        let always = |r: &PatientRecord| -> Result<Classification, RecordFault> {
            Ok(Classification::of_record(r.id(), [Category::Population]))
        };
        let r = record(json!({"id": "1"}));
        assert_eq!(always.classify(&r).unwrap().members(Category::Population).len(), 1);
    }
}
