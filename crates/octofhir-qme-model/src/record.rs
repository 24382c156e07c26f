//! Patient records

use crate::error::ModelError;
use octofhir_qme_types::RecordId;
use serde_json::Value;
use std::sync::Arc;

/// Document fields tried, in order, for the record identifier
pub const ID_FIELDS: [&str; 2] = ["id", "patient_id"];

/// A read-only patient document with a stable identifier.
///
/// Cloning is cheap; the document is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    id: RecordId,
    document: Arc<Value>,
}

impl PatientRecord {
    pub fn new(id: impl Into<RecordId>, document: Value) -> Self {
        Self {
            id: id.into(),
            document: Arc::new(document),
        }
    }

    /// Build a record, taking the identifier from the document itself
    pub fn from_document(document: Value) -> Result<Self, ModelError> {
        let Value::Object(map) = &document else {
            return Err(ModelError::malformed_record(format!(
                "expected a JSON object, found {}",
                json_kind(&document)
            )));
        };

        let id = ID_FIELDS
            .iter()
            .find_map(|field| match map.get(*field) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                ModelError::malformed_record(format!(
                    "missing identifier (one of: {})",
                    ID_FIELDS.join(", ")
                ))
            })?;

        Ok(Self::new(id, document))
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Look up a nested field; `None` when any segment is missing
    pub fn field<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        lookup(&self.document, path)
    }
}

/// Walk object keys through a JSON value
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment.as_ref()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
