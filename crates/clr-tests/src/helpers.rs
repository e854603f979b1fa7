//! Shared builders for scenario and property tests.

use clr_core::types::{ProjectGroup, ProjectId, RawContribution};

/// Contribution from `who` of `amount`.
pub fn contrib(who: &str, amount: f64, verified: bool) -> RawContribution {
    RawContribution::new(who, amount, verified)
}

/// Project group with the given contributions.
pub fn group(id: u64, contributions: Vec<RawContribution>) -> ProjectGroup {
    ProjectGroup {
        id: ProjectId(id),
        contributions,
    }
}

/// Build groups from `(project, contributor, amount, verified)` tuples,
/// one group per distinct project in first-seen order.
pub fn groups_from(rows: &[(u64, String, f64, bool)]) -> Vec<ProjectGroup> {
    let mut groups: Vec<ProjectGroup> = Vec::new();
    for (project, who, amount, verified) in rows {
        let contribution = contrib(who, *amount, *verified);
        match groups.iter_mut().find(|g| g.id == ProjectId(*project)) {
            Some(g) => g.contributions.push(contribution),
            None => groups.push(group(*project, vec![contribution])),
        }
    }
    groups
}

/// `|a - b| <= tol`.
pub fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}
