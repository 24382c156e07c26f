//! Classification categories and per-category record sets

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One of the five measure components a record can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Population,
    Denominator,
    Numerator,
    Antinumerator,
    Exclusions,
}

impl Category {
    /// All categories in result-field order
    pub const ALL: [Category; 5] = [
        Category::Population,
        Category::Denominator,
        Category::Numerator,
        Category::Antinumerator,
        Category::Exclusions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Population => "population",
            Category::Denominator => "denominator",
            Category::Numerator => "numerator",
            Category::Antinumerator => "antinumerator",
            Category::Exclusions => "exclusions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValueError::unknown_category(s))
    }
}

/// Stable identifier of a patient record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Record identifiers grouped by category.
///
/// Forms a monoid under [`Classification::union`] with
/// [`Classification::empty`] as identity, which is what lets shard results be
/// folded in any grouping and order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    population: BTreeSet<RecordId>,
    denominator: BTreeSet<RecordId>,
    numerator: BTreeSet<RecordId>,
    antinumerator: BTreeSet<RecordId>,
    exclusions: BTreeSet<RecordId>,
}

impl Classification {
    /// The empty classification
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classification of one record into the given categories
    pub fn of_record(id: &RecordId, categories: impl IntoIterator<Item = Category>) -> Self {
        let mut classification = Self::empty();
        for category in categories {
            classification.insert(category, id.clone());
        }
        classification
    }

    /// Add a record to a category; false if it was already present
    pub fn insert(&mut self, category: Category, id: RecordId) -> bool {
        self.members_mut(category).insert(id)
    }

    /// Records in a category
    pub fn members(&self, category: Category) -> &BTreeSet<RecordId> {
        match category {
            Category::Population => &self.population,
            Category::Denominator => &self.denominator,
            Category::Numerator => &self.numerator,
            Category::Antinumerator => &self.antinumerator,
            Category::Exclusions => &self.exclusions,
        }
    }

    fn members_mut(&mut self, category: Category) -> &mut BTreeSet<RecordId> {
        match category {
            Category::Population => &mut self.population,
            Category::Denominator => &mut self.denominator,
            Category::Numerator => &mut self.numerator,
            Category::Antinumerator => &mut self.antinumerator,
            Category::Exclusions => &mut self.exclusions,
        }
    }

    pub fn contains(&self, category: Category, id: &RecordId) -> bool {
        self.members(category).contains(id)
    }

    /// True when every category is empty
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.members(*c).is_empty())
    }

    /// Categories a record belongs to
    pub fn categories_of(&self, id: &RecordId) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.contains(*c, id))
            .collect()
    }

    /// Per-category union, in place
    pub fn union_with(&mut self, other: Classification) {
        let Classification {
            population,
            denominator,
            numerator,
            antinumerator,
            exclusions,
        } = other;
        extend_set(&mut self.population, population);
        extend_set(&mut self.denominator, denominator);
        extend_set(&mut self.numerator, numerator);
        extend_set(&mut self.antinumerator, antinumerator);
        extend_set(&mut self.exclusions, exclusions);
    }

    /// Per-category union
    pub fn union(mut self, other: Classification) -> Classification {
        self.union_with(other);
        self
    }
}

/// Extend the larger set with the smaller one
fn extend_set(target: &mut BTreeSet<RecordId>, mut source: BTreeSet<RecordId>) {
    if source.len() > target.len() {
        std::mem::swap(target, &mut source);
    }
    target.append(&mut source);
}
