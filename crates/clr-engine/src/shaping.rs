//! Shaping of raw contribution and phantom-funding rows into project groups.
//!
//! The data layer hands over individual rows; matching works on one summed
//! entry per contributor and project. Rules:
//! 1. Only rows inside the round window (inclusive) count.
//! 2. Contributions must be matched, successful and a positive vote.
//! 3. A grant deferring its CLR to another grant is grouped under that grant.
//! 4. A contributor's phantom funding adds the value of their first phantom row.
//! 5. A contributor is verified when any of their counted rows is verified.
//! 6. Grants without any contributor produce no group. They stay eligible
//!    through [`eligible_projects`] so they still get a (collapsed) curve.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use clr_core::types::{ContributorId, ProjectGroup, ProjectId, RawContribution};
use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}

/// A grant eligible for matching in this round.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GrantEntry {
    pub id: ProjectId,
    #[serde(default)]
    pub defer_clr_to: Option<ProjectId>,
}

impl GrantEntry {
    pub fn new(id: u64) -> Self {
        Self {
            id: ProjectId(id),
            defer_clr_to: None,
        }
    }

    /// Id the grant's contributions are matched under.
    pub fn clr_id(&self) -> ProjectId {
        self.defer_clr_to.unwrap_or(self.id)
    }
}

/// One recorded contribution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContributionRow {
    pub grant_id: ProjectId,
    pub contributor_id: ContributorId,
    /// Amount in pot units; `None` when the amount could not be priced.
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default = "yes")]
    pub positive_vote: bool,
    #[serde(default = "yes")]
    pub matched: bool,
    #[serde(default = "yes")]
    pub success: bool,
}

/// Manually recorded funding attributed to a contributor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhantomFundingRow {
    pub grant_id: ProjectId,
    pub contributor_id: ContributorId,
    pub value: f64,
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Inclusive time window of a round.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RoundWindow {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }
}

/// Ids every eligible grant is matched under, whether or not anyone gave.
pub fn eligible_projects(grants: &[GrantEntry]) -> BTreeSet<ProjectId> {
    grants.iter().map(GrantEntry::clr_id).collect()
}

#[derive(Default)]
struct Tally {
    amount: f64,
    verified: bool,
    phantom: Option<f64>,
}

/// Build one group per grant with at least one contributor in `window`.
///
/// Groups follow the order of `grants`; contributors within a group are
/// ordered by id.
pub fn populate_groups(
    grants: &[GrantEntry],
    contributions: &[ContributionRow],
    phantom: &[PhantomFundingRow],
    window: &RoundWindow,
) -> Vec<ProjectGroup> {
    let mut groups = Vec::new();

    for grant in grants {
        let mut tallies: BTreeMap<&ContributorId, Tally> = BTreeMap::new();

        for row in contributions.iter().filter(|c| {
            c.grant_id == grant.id
                && c.positive_vote
                && c.matched
                && c.success
                && window.contains(&c.created_at)
        }) {
            let tally = tallies.entry(&row.contributor_id).or_default();
            tally.amount += row.amount.unwrap_or(0.0);
            tally.verified |= row.verified;
        }

        for row in phantom
            .iter()
            .filter(|p| p.grant_id == grant.id && window.contains(&p.created_at))
        {
            let tally = tallies.entry(&row.contributor_id).or_default();
            tally.phantom.get_or_insert(row.value);
            tally.verified |= row.verified;
        }

        if tallies.is_empty() {
            continue;
        }

        let contributions = tallies
            .into_iter()
            .map(|(who, t)| RawContribution {
                contributor_id: Some(who.clone()),
                total_amount: t.amount + t.phantom.unwrap_or(0.0),
                verified: t.verified,
            })
            .collect();

        groups.push(ProjectGroup {
            id: grant.clr_id(),
            contributions,
        });
    }

    groups
}
