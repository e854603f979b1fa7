//! Per-round summation of contributions by project and contributor.

use clr_core::constants::CURRENT_ROUND_DECAY;
use clr_core::params::ClrParams;
use clr_core::types::{ContributionRecord, Round, RoundAggregate};

/// Weight applied to every amount of `round`.
pub fn round_weight(round: Round, params: &ClrParams) -> f64 {
    match round {
        Round::Current => CURRENT_ROUND_DECAY,
        Round::Previous => params.round_decay,
    }
}

/// Sum `records` per `(project, contributor)`, each amount multiplied by `weight`.
pub fn aggregate_round<'a, I>(records: I, round: Round, weight: f64) -> RoundAggregate
where
    I: IntoIterator<Item = &'a ContributionRecord>,
{
    let mut agg = RoundAggregate::new(round);
    for r in records {
        agg.add(r.project, r.contributor.clone(), r.amount() * weight);
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use clr_core::constants::{MATCH_TOLERANCE, PREVIOUS_ROUND_DECAY};
    use clr_core::types::{ContributorKey, ProjectId};
    use proptest::prelude::*;

    fn rec(project: u64, who: &str, amount: f64) -> ContributionRecord {
        ContributionRecord::new(ProjectId(project), ContributorKey::real(who), false, amount).unwrap()
    }

    #[test]
    fn current_round_unscaled() {
        let records = [rec(1, "a", 10.0), rec(1, "a", 5.0)];
        let agg = aggregate_round(&records, Round::Current, CURRENT_ROUND_DECAY);
        assert_eq!(agg.project(&ProjectId(1)).unwrap()[&ContributorKey::real("a")], 15.0);
    }

    #[test]
    fn previous_round_decayed() {
        let params = ClrParams::new(1.0, 1.0);
        let records = [rec(1, "a", 9.0), rec(1, "a", 3.0)];
        let agg = aggregate_round(&records, Round::Previous, round_weight(Round::Previous, &params));
        let got = agg.project(&ProjectId(1)).unwrap()[&ContributorKey::real("a")];
        assert!((got - 12.0 * PREVIOUS_ROUND_DECAY).abs() < MATCH_TOLERANCE);
    }

    #[test]
    fn weights_follow_params() {
        let params = ClrParams::new(1.0, 1.0).with_round_decay(0.5);
        assert_eq!(round_weight(Round::Current, &params), 1.0);
        assert_eq!(round_weight(Round::Previous, &params), 0.5);
    }

    #[test]
    fn keeps_projects_apart() {
        let records = [rec(1, "a", 1.0), rec(2, "a", 2.0)];
        let agg = aggregate_round(&records, Round::Current, 1.0);
        assert_eq!(agg.project_count(), 2);
        assert_eq!(agg.project(&ProjectId(2)).unwrap()[&ContributorKey::real("a")], 2.0);
    }

    proptest! {
        #[test]
        fn summation_order_independent(
            amounts in proptest::collection::vec((0u64..3, 0usize..4, 0.0f64..1e6), 1..40)
        ) {
            let names = ["a", "b", "c", "d"];
            let mut records: Vec<ContributionRecord> = amounts
                .iter()
                .map(|(p, n, a)| rec(*p, names[*n], *a))
                .collect();
            let forward = aggregate_round(&records, Round::Previous, PREVIOUS_ROUND_DECAY);
            records.reverse();
            let backward = aggregate_round(&records, Round::Previous, PREVIOUS_ROUND_DECAY);
            for (project, contribs) in forward.projects() {
                let other = backward.project(project).unwrap();
                for (who, v) in contribs {
                    prop_assert!((v - other[who]).abs() <= 1e-9 * v.abs().max(1.0));
                }
            }
        }
    }
}
