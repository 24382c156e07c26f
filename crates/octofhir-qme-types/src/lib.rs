//! Quality measure runtime types
//!
//! This crate defines the data shared by every stage of measure evaluation:
//! - `QmeValue`: runtime values produced by criteria and read from records
//! - `ParameterValues`: per-evaluation parameters with case-insensitive keys
//! - `Category`, `RecordId`, `Classification`: per-category record sets
//! - `Summary`: the public counts/members result shape

pub mod classification;
pub mod error;
pub mod params;
pub mod summary;
pub mod value;

pub use classification::{Category, Classification, RecordId};
pub use error::{ValueError, ValueResult};
pub use params::ParameterValues;
pub use summary::Summary;
pub use value::{DATE_FORMAT, QmeValue, parse_date};
