//! Patient record corpus abstraction

use crate::error::{CorpusError, LoadError};
use crate::record::{ID_FIELDS, PatientRecord};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Stream of records; items may individually fail
pub type RecordStream<'a> = BoxStream<'a, Result<PatientRecord, CorpusError>>;

/// A finite, re-iterable collection of patient records.
///
/// Each call to [`RecordCorpus::stream`] starts from the beginning. A
/// [`CorpusError::MalformedRecord`] item affects that record only; a
/// [`CorpusError::Unavailable`] item means the stream cannot be trusted.
pub trait RecordCorpus: Send + Sync {
    fn stream(&self) -> RecordStream<'_>;

    /// Number of entries, when known up front
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Record(PatientRecord),
    Malformed(CorpusError),
}

/// Corpus held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    entries: Vec<Entry>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PatientRecord>) -> Self {
        Self {
            entries: records.into_iter().map(Entry::Record).collect(),
        }
    }

    /// Build from raw documents; documents without an identifier become
    /// malformed entries.
    pub fn from_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let mut corpus = Self::new();
        for document in documents {
            corpus.push_document(document);
        }
        corpus
    }

    /// Read a corpus file: a JSON array of documents, or one document per line
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;

        if content.trim_start().starts_with('[') {
            let documents: Vec<Value> =
                serde_json::from_str(&content).map_err(|e| LoadError::json(path, e))?;
            return Ok(Self::from_documents(documents));
        }

        let mut corpus = Self::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(document) => corpus.push_document(document),
                Err(e) => corpus.push_malformed(CorpusError::malformed(
                    None,
                    format!("line {}: {}", index + 1, e),
                )),
            }
        }
        Ok(corpus)
    }

    pub fn push(&mut self, record: PatientRecord) {
        self.entries.push(Entry::Record(record));
    }

    pub fn push_document(&mut self, document: Value) {
        let hint = id_hint(&document);
        match PatientRecord::from_document(document) {
            Ok(record) => self.push(record),
            Err(e) => self.push_malformed(CorpusError::malformed(hint, e.to_string())),
        }
    }

    pub fn push_malformed(&mut self, error: CorpusError) {
        self.entries.push(Entry::Malformed(error));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecordCorpus for InMemoryCorpus {
    fn stream(&self) -> RecordStream<'_> {
        stream::iter(self.entries.iter().map(|entry| match entry {
            Entry::Record(record) => Ok(record.clone()),
            Entry::Malformed(error) => Err(error.clone()),
        }))
        .boxed()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

impl FromIterator<PatientRecord> for InMemoryCorpus {
    fn from_iter<I: IntoIterator<Item = PatientRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

/// Best-effort id of a document that failed to load, as plain text
fn id_hint(document: &Value) -> Option<String> {
    ID_FIELDS.iter().find_map(|field| match document.get(*field)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}
