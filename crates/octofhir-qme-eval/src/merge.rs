//! Combining partial classifications

use octofhir_qme_types::Classification;

/// A monoid over classifications.
///
/// `merge` must be associative and commutative with `identity` as its
/// neutral element, so the engine may fold partials in any grouping.
pub trait Merge: Send + Sync {
    fn identity(&self) -> Classification;

    fn merge(&self, left: Classification, right: Classification) -> Classification;

    /// Linear fold starting from the identity
    fn fold<I>(&self, partials: I) -> Classification
    where
        I: IntoIterator<Item = Classification>,
        Self: Sized,
    {
        partials
            .into_iter()
            .fold(self.identity(), |acc, partial| self.merge(acc, partial))
    }
}

/// Per-category set union; idempotent as well
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnionMerger;

impl Merge for UnionMerger {
    fn identity(&self) -> Classification {
        Classification::empty()
    }

    fn merge(&self, left: Classification, right: Classification) -> Classification {
        left.union(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_qme_types::{Category, RecordId};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn classification(entries: &[(u8, u8)]) -> Classification {
        let mut c = Classification::empty();
        for (category, id) in entries {
            let category = Category::ALL[*category as usize % Category::ALL.len()];
            c.insert(category, RecordId::new(format!("r{}", id)));
        }
        c
    }

    fn arb_classification() -> impl Strategy<Value = Classification> {
        prop::collection::vec((any::<u8>(), 0u8..20), 0..12).prop_map(|e| classification(&e))
    }

    proptest! {
        #[test]
        fn merge_is_associative(
            a in arb_classification(),
            b in arb_classification(),
            c in arb_classification(),
        ) {
            let m = UnionMerger;
            let left = m.merge(m.merge(a.clone(), b.clone()), c.clone());
            let right = m.merge(a, m.merge(b, c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn merge_is_commutative(a in arb_classification(), b in arb_classification()) {
            let m = UnionMerger;
            prop_assert_eq!(m.merge(a.clone(), b.clone()), m.merge(b, a));
        }

        #[test]
        fn merge_is_idempotent_with_identity(a in arb_classification()) {
            let m = UnionMerger;
            prop_assert_eq!(m.merge(a.clone(), a.clone()), a.clone());
            prop_assert_eq!(m.merge(m.identity(), a.clone()), a);
        }

        #[test]
        fn fold_ignores_order(mut parts in prop::collection::vec(arb_classification(), 0..6)) {
            let m = UnionMerger;
            let forward = m.fold(parts.clone());
            parts.reverse();
            prop_assert_eq!(forward, m.fold(parts));
        }
    }

    #[test]
    fn test_fold_of_nothing_is_identity() {
        assert_eq!(UnionMerger.fold(Vec::new()), Classification::empty());
    }
}
