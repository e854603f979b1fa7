//! Set of contributors verified in either round.

use std::collections::HashSet;

use clr_core::types::{ContributionRecord, ContributorKey};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedSet(HashSet<ContributorKey>);

impl VerifiedSet {
    /// Collect every contributor with at least one verified record.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ContributionRecord>,
    {
        Self(
            records
                .into_iter()
                .filter(|r| r.verified)
                .map(|r| r.contributor.clone())
                .collect(),
        )
    }

    pub fn contains(&self, key: &ContributorKey) -> bool {
        self.0.contains(key)
    }

    pub fn both(&self, a: &ContributorKey, b: &ContributorKey) -> bool {
        self.contains(a) && self.contains(b)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
