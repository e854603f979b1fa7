//! End-to-end matching run over a current and a previous round.

use clr_core::cancellation::ComputeBudget;
use clr_core::error::CalcError;
use clr_core::params::ClrParams;
use clr_core::types::{
    CombinedAggregate, ContributionRecord, MatchResult, ProjectGroup, Round, TranslationDiagnostics,
};
use tracing::{debug, warn};

use crate::aggregate::{aggregate_round, round_weight};
use crate::calculator::calculate_clr;
use crate::pair_totals::PairTotalMatrix;
use crate::translate::translate_groups;
use crate::verification::VerifiedSet;

/// Run the full pipeline on pre-shaped groups with no computation budget.
pub fn run_clr_calcs(
    current: &[ProjectGroup],
    previous: &[ProjectGroup],
    params: &ClrParams,
) -> Result<MatchResult, CalcError> {
    run_clr_calcs_with_budget(current, previous, params, &ComputeBudget::unbounded())
}

/// Run the full pipeline on pre-shaped groups.
///
/// Parameters are validated before anything else. Entries dropped during
/// translation are reported in [`MatchResult::diagnostics`].
pub fn run_clr_calcs_with_budget(
    current: &[ProjectGroup],
    previous: &[ProjectGroup],
    params: &ClrParams,
    budget: &ComputeBudget,
) -> Result<MatchResult, CalcError> {
    params.validate()?;

    let cur = translate_groups(current);
    let prev = translate_groups(previous);

    let mut diagnostics = cur.diagnostics;
    diagnostics.merge(&prev.diagnostics);
    report_dropped(&diagnostics);

    let mut result = calculate_from_records(&cur.records, &prev.records, params, budget)?;
    result.diagnostics = diagnostics;
    Ok(result)
}

/// Run verification, aggregation, pair totals and calculation on
/// already-translated records.
///
/// The iterators are walked twice (verification, then aggregation), so they
/// must be cheap to clone. The returned diagnostics are empty; callers that
/// translated the records fill them in.
pub fn calculate_from_records<'a, C, P>(
    current: C,
    previous: P,
    params: &ClrParams,
    budget: &ComputeBudget,
) -> Result<MatchResult, CalcError>
where
    C: IntoIterator<Item = &'a ContributionRecord> + Clone,
    P: IntoIterator<Item = &'a ContributionRecord> + Clone,
{
    params.validate()?;

    let verified = VerifiedSet::from_records(current.clone().into_iter().chain(previous.clone()));

    let agg = CombinedAggregate::new(
        aggregate_round(current, Round::Current, round_weight(Round::Current, params)),
        aggregate_round(previous, Round::Previous, round_weight(Round::Previous, params)),
    );

    let pairs = PairTotalMatrix::build(&agg, budget)?;
    let alloc = calculate_clr(&agg, &pairs, &verified, params, budget)?;

    debug!(
        projects = agg.current.project_count(),
        previous_projects = agg.previous.project_count(),
        contributors = pairs.len(),
        verified = verified.len(),
        bigtot = alloc.unnormalized_total,
        saturated = alloc.saturated,
        pct = alloc.percentage_distributed,
        "clr run complete"
    );

    Ok(MatchResult {
        matches: alloc.matches,
        percentage_distributed: alloc.percentage_distributed,
        unnormalized_total: alloc.unnormalized_total,
        saturated: alloc.saturated,
        diagnostics: TranslationDiagnostics::default(),
    })
}

pub(crate) fn report_dropped(diagnostics: &TranslationDiagnostics) {
    if diagnostics.dropped() > 0 {
        warn!(
            missing_contributor = diagnostics.missing_contributor,
            invalid_amount = diagnostics.invalid_amount,
            "dropped contributions during translation"
        );
    }
}
