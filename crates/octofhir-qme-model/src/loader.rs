//! Filesystem loader for measure documents and bundles

use crate::definition::MeasureDefinition;
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Bundle metadata file name
pub const BUNDLE_FILE: &str = "bundle.json";
/// Directory holding a bundle's measures
pub const BUNDLE_MEASURES_DIR: &str = "measures";

/// Contents of `bundle.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A loaded bundle: metadata plus its tagged measures
#[derive(Debug, Clone)]
pub struct Bundle {
    pub metadata: BundleMetadata,
    pub measures: Vec<MeasureDefinition>,
}

/// Loads and validates measure definitions from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasureLoader;

impl MeasureLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load whatever `path` points at: a bundle directory (one holding
    /// `bundle.json`), a directory of measure files, or a single file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<MeasureDefinition>, LoadError> {
        let path = path.as_ref();
        if path.join(BUNDLE_FILE).is_file() {
            Ok(self.load_bundle(path)?.measures)
        } else {
            self.load_measure(path)
        }
    }

    /// Load a measure file (one definition or an array of them) or a
    /// directory of such files, visited in file-name order.
    pub fn load_measure(&self, path: impl AsRef<Path>) -> Result<Vec<MeasureDefinition>, LoadError> {
        let path = path.as_ref();
        let mut measures = Vec::new();
        let mut seen = HashSet::new();
        self.collect(path, &mut measures, &mut seen)?;
        Ok(measures)
    }

    /// Load `bundle.json` and everything under `measures/`
    pub fn load_bundle(&self, dir: impl AsRef<Path>) -> Result<Bundle, LoadError> {
        let dir = dir.as_ref();
        let metadata_path = dir.join(BUNDLE_FILE);
        let metadata: BundleMetadata = read_json(&metadata_path)
            .and_then(|value| serde_json::from_value(value).map_err(|e| LoadError::json(&metadata_path, e)))?;

        let measures_dir = dir.join(BUNDLE_MEASURES_DIR);
        let mut measures = if measures_dir.is_dir() {
            self.load_measure(&measures_dir)?
        } else {
            Vec::new()
        };
        for measure in &mut measures {
            measure.bundle = Some(metadata.id.clone());
        }

        Ok(Bundle { metadata, measures })
    }

    fn collect(
        &self,
        path: &Path,
        measures: &mut Vec<MeasureDefinition>,
        seen: &mut HashSet<String>,
    ) -> Result<(), LoadError> {
        if path.is_dir() {
            for entry in sorted_entries(path)? {
                if entry.is_dir() || is_json(&entry) {
                    self.collect(&entry, measures, seen)?;
                }
            }
            return Ok(());
        }

        let documents = match read_json(path)? {
            Value::Array(items) => items,
            single => vec![single],
        };
        for document in documents {
            let definition: MeasureDefinition =
                serde_json::from_value(document).map_err(|e| LoadError::json(path, e))?;
            definition.validate().map_err(|source| LoadError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
            let key = definition.key().to_string();
            if !seen.insert(key.clone()) {
                return Err(LoadError::Duplicate {
                    path: path.to_path_buf(),
                    key,
                });
            }
            measures.push(definition);
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Value, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| LoadError::json(path, e))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| LoadError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::io(dir, e))?;
    entries.sort();
    Ok(entries)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
