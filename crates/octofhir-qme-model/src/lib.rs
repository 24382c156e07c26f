//! Measure definitions, patient records, and the repository and corpus
//! traits the evaluator consumes.
//!
//! In-memory implementations of both traits are provided, together with a
//! [`MeasureLoader`] that reads definitions and bundles from disk.

pub mod corpus;
pub mod definition;
pub mod error;
pub mod loader;
pub mod record;
pub mod repository;

pub use corpus::{InMemoryCorpus, RecordCorpus, RecordStream};
pub use definition::{MeasureDefinition, MeasureKey};
pub use error::{CorpusError, LoadError, ModelError, RepositoryError};
pub use loader::{Bundle, BundleMetadata, MeasureLoader};
pub use record::PatientRecord;
pub use repository::{InMemoryMeasureRepository, MeasureRepository};
