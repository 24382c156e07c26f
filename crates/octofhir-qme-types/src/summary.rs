//! Public result shape of a measure evaluation

use crate::classification::{Category, RecordId};
use serde::{Deserialize, Serialize};

/// Per-category counts and member lists.
///
/// Serializes to the flat `<category>_count` / `<category>_members` field set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub population_count: usize,
    pub population_members: Vec<RecordId>,
    pub denominator_count: usize,
    pub denominator_members: Vec<RecordId>,
    pub numerator_count: usize,
    pub numerator_members: Vec<RecordId>,
    pub antinumerator_count: usize,
    pub antinumerator_members: Vec<RecordId>,
    pub exclusions_count: usize,
    pub exclusions_members: Vec<RecordId>,
}

impl Summary {
    /// Count for a category
    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Population => self.population_count,
            Category::Denominator => self.denominator_count,
            Category::Numerator => self.numerator_count,
            Category::Antinumerator => self.antinumerator_count,
            Category::Exclusions => self.exclusions_count,
        }
    }

    /// Members of a category
    pub fn members(&self, category: Category) -> &[RecordId] {
        match category {
            Category::Population => &self.population_members,
            Category::Denominator => &self.denominator_members,
            Category::Numerator => &self.numerator_members,
            Category::Antinumerator => &self.antinumerator_members,
            Category::Exclusions => &self.exclusions_members,
        }
    }

    /// Set both fields of a category
    pub fn set(&mut self, category: Category, members: Vec<RecordId>) {
        let count = members.len();
        let (count_field, members_field) = match category {
            Category::Population => (&mut self.population_count, &mut self.population_members),
            Category::Denominator => (&mut self.denominator_count, &mut self.denominator_members),
            Category::Numerator => (&mut self.numerator_count, &mut self.numerator_members),
            Category::Antinumerator => {
                (&mut self.antinumerator_count, &mut self.antinumerator_members)
            }
            Category::Exclusions => (&mut self.exclusions_count, &mut self.exclusions_members),
        };
        *count_field = count;
        *members_field = members;
    }
}
