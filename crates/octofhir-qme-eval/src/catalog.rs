//! Grouping stored definitions into a catalog

use indexmap::IndexMap;
use octofhir_qme_model::MeasureDefinition;
use serde::{Deserialize, Serialize};

/// One sub-id variant of a measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub sub_id: String,
    #[serde(default)]
    pub subtitle: String,
}

/// Catalog entry shared by every variant of a measure id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub steward: String,
    pub description: String,
    pub category: String,
    pub variants: Vec<Variant>,
}

impl CatalogEntry {
    fn from_definition(definition: &MeasureDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            steward: definition.steward.clone(),
            description: definition.description.clone(),
            category: definition.category.clone(),
            variants: Vec::new(),
        }
    }
}

/// Measures keyed by id, in first-seen order
pub type MeasureCatalog = IndexMap<String, CatalogEntry>;

/// Group definitions by id.
///
/// The first definition seen for an id supplies the shared fields; every
/// definition with a sub-id adds a variant, in encounter order.
pub fn build_catalog<'a>(definitions: impl IntoIterator<Item = &'a MeasureDefinition>) -> MeasureCatalog {
    let mut catalog = MeasureCatalog::new();
    for definition in definitions {
        let entry = catalog
            .entry(definition.id.clone())
            .or_insert_with(|| CatalogEntry::from_definition(definition));
        if let Some(sub_id) = &definition.sub_id {
            entry.variants.push(Variant {
                sub_id: sub_id.clone(),
                subtitle: definition.subtitle.clone().unwrap_or_default(),
            });
        }
    }
    catalog
}
