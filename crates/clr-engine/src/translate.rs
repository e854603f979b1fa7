//! Flattening of per-project contribution groups into uniform records.

use clr_core::types::{
    ContributionRecord, ContributorKey, ProjectGroup, TranslationDiagnostics,
};

/// Records produced from a set of project groups, plus what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub records: Vec<ContributionRecord>,
    pub diagnostics: TranslationDiagnostics,
}

/// Flatten `groups` into records, preserving group and contribution order.
///
/// Entries without a contributor id (absent or empty) and entries with a
/// negative or non-finite amount are excluded and counted.
pub fn translate_groups(groups: &[ProjectGroup]) -> Translation {
    let mut out = Translation::default();

    for group in groups {
        for c in &group.contributions {
            let Some(id) = c.contributor_id.as_ref().filter(|id| !id.as_str().is_empty()) else {
                out.diagnostics.missing_contributor += 1;
                continue;
            };
            match ContributionRecord::new(
                group.id,
                ContributorKey::Real(id.clone()),
                c.verified,
                c.total_amount,
            ) {
                Some(rec) => out.records.push(rec),
                None => out.diagnostics.invalid_amount += 1,
            }
        }
    }

    out
}
