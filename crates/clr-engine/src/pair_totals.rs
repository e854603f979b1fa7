//! Pairwise normalization matrix across contributors and rounds.
//!
//! `matrix[k1][k2]` accumulates `sqrt(v1 * v2)` for every project both
//! contributors gave to in the current round. Cross-round pressure
//! `sqrt(v1 * y1)` between a current contributor `k1` and a previous-round
//! contributor `x1` of the same project lands only in row `k1`, so the
//! matrix is not symmetric.

use std::collections::HashMap;

use clr_core::cancellation::ComputeBudget;
use clr_core::error::CalcError;
use clr_core::types::{CombinedAggregate, ContributorKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairTotalMatrix {
    rows: HashMap<ContributorKey, HashMap<ContributorKey, f64>>,
}

impl PairTotalMatrix {
    /// Build the matrix from both rounds, polling `budget` once per project.
    pub fn build(agg: &CombinedAggregate, budget: &ComputeBudget) -> Result<Self, CalcError> {
        let mut rows: HashMap<ContributorKey, HashMap<ContributorKey, f64>> = HashMap::new();

        for (done, (project, contribz)) in agg.current.projects().enumerate() {
            budget.check(done)?;
            let previous = agg.previous.project(project);

            for (k1, v1) in contribz {
                let s1 = v1.sqrt();
                let row = rows.entry(k1.clone()).or_default();

                for (k2, v2) in contribz {
                    *row.entry(k2.clone()).or_insert(0.0) += s1 * v2.sqrt();
                }

                if let Some(previous) = previous {
                    for (x1, y1) in previous {
                        *row.entry(x1.clone()).or_insert(0.0) += s1 * y1.sqrt();
                    }
                }
            }
        }

        Ok(Self { rows })
    }

    /// Accumulated pressure from `k1` towards `k2`; zero when never paired.
    pub fn get(&self, k1: &ContributorKey, k2: &ContributorKey) -> f64 {
        self.rows
            .get(k1)
            .and_then(|row| row.get(k2))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn row(&self, k1: &ContributorKey) -> Option<&HashMap<ContributorKey, f64>> {
        self.rows.get(k1)
    }

    /// Number of contributors with a non-empty row.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clr_core::cancellation::CancellationToken;
    use clr_core::constants::MAX_AMOUNT;
    use clr_core::types::{ProjectId, Round, RoundAggregate};

    fn key(s: &str) -> ContributorKey {
        ContributorKey::real(s)
    }

    fn combined(current: &[(u64, &str, f64)], previous: &[(u64, &str, f64)]) -> CombinedAggregate {
        let mut cur = RoundAggregate::new(Round::Current);
        for (p, who, v) in current {
            cur.add(ProjectId(*p), key(who), *v);
        }
        let mut prev = RoundAggregate::new(Round::Previous);
        for (p, who, v) in previous {
            prev.add(ProjectId(*p), key(who), *v);
        }
        CombinedAggregate::new(cur, prev)
    }

    #[test]
    fn self_pair_equals_amount() {
        let agg = combined(&[(1, "a", 9.0)], &[]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        assert_eq!(m.get(&key("a"), &key("a")), 9.0);
    }

    #[test]
    fn current_pairs_accumulate_across_projects() {
        let agg = combined(&[(1, "a", 4.0), (1, "b", 9.0), (2, "a", 1.0), (2, "b", 1.0)], &[]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        // sqrt(4*9) + sqrt(1*1)
        assert_eq!(m.get(&key("a"), &key("b")), 7.0);
        assert_eq!(m.get(&key("b"), &key("a")), 7.0);
    }

    #[test]
    fn cross_round_term_only_in_current_row() {
        let agg = combined(&[(1, "a", 4.0)], &[(1, "z", 9.0)]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        assert_eq!(m.get(&key("a"), &key("z")), 6.0);
        assert_eq!(m.get(&key("z"), &key("a")), 0.0);
        assert!(m.row(&key("z")).is_none());
    }

    #[test]
    fn previous_round_of_other_project_ignored() {
        let agg = combined(&[(1, "a", 4.0)], &[(2, "z", 9.0)]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        assert_eq!(m.get(&key("a"), &key("z")), 0.0);
    }

    #[test]
    fn same_contributor_in_both_rounds_shares_cell() {
        let agg = combined(&[(1, "a", 4.0)], &[(1, "a", 1.0)]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        // self pair 4 + cross-round sqrt(4*1)
        assert_eq!(m.get(&key("a"), &key("a")), 6.0);
    }

    #[test]
    fn largest_amounts_stay_finite() {
        let agg = combined(&[(1, "a", MAX_AMOUNT), (1, "b", MAX_AMOUNT)], &[(1, "z", MAX_AMOUNT)]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        assert!((m.get(&key("a"), &key("b")) - MAX_AMOUNT).abs() <= MAX_AMOUNT * 1e-12);
        assert!(m.get(&key("a"), &key("z")).is_finite());
    }

    #[test]
    fn cancelled_budget_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let agg = combined(&[(1, "a", 1.0)], &[]);
        let err = PairTotalMatrix::build(&agg, &ComputeBudget::with_token(token)).unwrap_err();
        assert_eq!(err, CalcError::Cancelled);
    }

    #[test]
    fn empty_rounds_empty_matrix() {
        let agg = combined(&[], &[(1, "z", 1.0)]);
        let m = PairTotalMatrix::build(&agg, &ComputeBudget::unbounded()).unwrap();
        assert!(m.is_empty());
    }
}
