//! Converting a classification into its public summary

use octofhir_qme_types::{Category, Classification, Summary};

/// Per-category counts and sorted member lists
pub fn summarize(classification: &Classification) -> Summary {
    let mut summary = Summary::default();
    for category in Category::ALL {
        // BTreeSet iteration is already sorted and duplicate free
        let members = classification.members(category).iter().cloned().collect();
        summary.set(category, members);
    }
    summary
}
