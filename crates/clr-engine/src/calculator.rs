//! Per-project matching amounts and pot saturation.
//!
//! For every ordered pair of current-round contributors `(k1, k2)` of a
//! project, including `k1 == k2`, the project earns
//!
//! ```text
//! sqrt(v1) * sqrt(v2) / (pair_total[k1][k2] / threshold + 1)
//! ```
//!
//! where `threshold` is `v_threshold` only when `k2 > k1` and both are
//! verified, otherwise `uv_threshold`. Self-pairs and the reverse direction
//! of a verified pair therefore always use `uv_threshold`. Cross-round pairs
//! with a previous-round contributor `x1` use `v_threshold` when `x1 != k1`
//! and both are verified.
//!
//! Once all projects are summed, totals exceeding the pot are scaled down
//! proportionally.

use std::collections::BTreeMap;

use clr_core::cancellation::ComputeBudget;
use clr_core::constants::FULL_DISTRIBUTION_PCT;
use clr_core::error::CalcError;
use clr_core::params::ClrParams;
use clr_core::types::{CombinedAggregate, ProjectId};

use crate::pair_totals::PairTotalMatrix;
use crate::verification::VerifiedSet;

/// Matching amounts after saturation, with the distribution figures.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub matches: BTreeMap<ProjectId, f64>,
    pub unnormalized_total: f64,
    pub percentage_distributed: f64,
    pub saturated: bool,
}

/// Unnormalized pairwise total of every project with current-round support.
pub fn project_totals(
    agg: &CombinedAggregate,
    pairs: &PairTotalMatrix,
    verified: &VerifiedSet,
    params: &ClrParams,
    budget: &ComputeBudget,
) -> Result<BTreeMap<ProjectId, f64>, CalcError> {
    let mut totals = BTreeMap::new();

    for (done, (project, contribz)) in agg.current.projects().enumerate() {
        budget.check(done)?;
        let previous = agg.previous.project(project);
        let mut tot = 0.0;

        for (k1, v1) in contribz {
            let s1 = v1.sqrt();
            for (k2, v2) in contribz {
                let verified_pair = k2 > k1 && verified.both(k1, k2);
                let threshold = params.threshold(verified_pair);
                tot += s1 * v2.sqrt() / (pairs.get(k1, k2) / threshold + 1.0);
            }

            if let Some(previous) = previous {
                for (x1, y1) in previous {
                    let verified_pair = x1 != k1 && verified.both(x1, k1);
                    let threshold = params.threshold(verified_pair);
                    tot += s1 * y1.sqrt() / (pairs.get(k1, x1) / threshold + 1.0);
                }
            }
        }

        totals.insert(*project, tot);
    }

    Ok(totals)
}

/// Scale `totals` down to `total_pot` when their sum reaches it.
///
/// `total_pot` must be positive (see [`ClrParams::validate`]).
pub fn apply_saturation(totals: BTreeMap<ProjectId, f64>, total_pot: f64) -> Allocation {
    let bigtot: f64 = totals.values().sum();

    if bigtot >= total_pot {
        let matches = totals
            .into_iter()
            .map(|(project, tot)| (project, (tot / bigtot) * total_pot))
            .collect();
        Allocation {
            matches,
            unnormalized_total: bigtot,
            percentage_distributed: FULL_DISTRIBUTION_PCT,
            saturated: true,
        }
    } else {
        Allocation {
            matches: totals,
            unnormalized_total: bigtot,
            percentage_distributed: (bigtot / total_pot) * FULL_DISTRIBUTION_PCT,
            saturated: false,
        }
    }
}

/// Full calculation step: pairwise totals followed by saturation.
pub fn calculate_clr(
    agg: &CombinedAggregate,
    pairs: &PairTotalMatrix,
    verified: &VerifiedSet,
    params: &ClrParams,
    budget: &ComputeBudget,
) -> Result<Allocation, CalcError> {
    let totals = project_totals(agg, pairs, verified, params, budget)?;
    Ok(apply_saturation(totals, params.total_pot))
}
