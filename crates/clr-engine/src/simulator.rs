//! Donation-impact simulation and prediction curves.
//!
//! Every candidate donation is evaluated against the same read-only
//! [`Baseline`]: the synthetic record is chained onto the borrowed baseline
//! records instead of copying the dataset. Evaluations share no mutable
//! state and run in parallel on the rayon pool.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use clr_core::cancellation::{CancellationToken, ComputeBudget};
use clr_core::constants::{ESTIMABLE_PROBE_POINTS, PREDICTION_LADDER};
use clr_core::error::{CalcError, ConfigError};
use clr_core::params::ClrParams;
use clr_core::types::{
    ContributionRecord, ContributorKey, MatchResult, PredictionCurve, PredictionPoint, ProjectGroup,
    ProjectId, ProjectSummary, TranslationDiagnostics,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::orchestrator::{calculate_from_records, report_dropped};
use crate::translate::translate_groups;

/// Translated records of both rounds, shared by every simulation.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    current: Vec<ContributionRecord>,
    previous: Vec<ContributionRecord>,
    /// Projects with a current-round group, even an empty one.
    current_groups: BTreeSet<ProjectId>,
    projects: BTreeSet<ProjectId>,
    diagnostics: TranslationDiagnostics,
}

impl Baseline {
    pub fn new(current: &[ProjectGroup], previous: &[ProjectGroup]) -> Self {
        let cur = translate_groups(current);
        let prev = translate_groups(previous);
        let mut diagnostics = cur.diagnostics;
        diagnostics.merge(&prev.diagnostics);
        report_dropped(&diagnostics);

        let current_groups: BTreeSet<ProjectId> = current.iter().map(|g| g.id).collect();
        let projects = current_groups
            .iter()
            .copied()
            .chain(previous.iter().map(|g| g.id))
            .collect();

        Self {
            current: cur.records,
            previous: prev.records,
            current_groups,
            projects,
            diagnostics,
        }
    }

    /// Also predict `eligible` projects that have no group in either round.
    ///
    /// They get no synthetic donation, so their curves collapse to zero rows.
    pub fn with_eligible(mut self, eligible: impl IntoIterator<Item = ProjectId>) -> Self {
        self.projects.extend(eligible);
        self
    }

    /// Every project seen in either round or marked eligible, ascending.
    pub fn projects(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.projects.iter().copied()
    }

    pub fn has_current_group(&self, project: &ProjectId) -> bool {
        self.current_groups.contains(project)
    }

    pub fn diagnostics(&self) -> TranslationDiagnostics {
        self.diagnostics
    }

    /// Contributor count and amount received this round, with the given match.
    pub fn summary(&self, project: ProjectId, baseline_match: f64) -> ProjectSummary {
        let mut per_contributor: BTreeMap<&ContributorKey, f64> = BTreeMap::new();
        for r in self.current.iter().filter(|r| r.project == project) {
            *per_contributor.entry(&r.contributor).or_insert(0.0) += r.amount();
        }
        ProjectSummary {
            baseline_match,
            contributor_count: per_contributor.len(),
            amount_received: per_contributor.values().sum(),
        }
    }
}

/// Knobs of a prediction run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Candidate donations; the first must be zero (the baseline).
    pub ladder: Vec<f64>,
    /// Wall-clock budget per project. `None` disables the deadline.
    pub per_project_budget: Option<Duration>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ladder: PREDICTION_LADDER.to_vec(),
            per_project_budget: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ladder.len() < ESTIMABLE_PROBE_POINTS {
            return Err(ConfigError::LadderTooShort {
                min: ESTIMABLE_PROBE_POINTS,
                got: self.ladder.len(),
            });
        }
        if self.ladder[0] != 0.0 {
            return Err(ConfigError::LadderNotAnchored);
        }
        Ok(())
    }
}

/// Curve (or the reason it could not be built) for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOutcome {
    pub project: ProjectId,
    pub curve: Result<PredictionCurve, CalcError>,
    pub summary: ProjectSummary,
}

/// Baseline result plus one outcome per project.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRun {
    pub baseline: MatchResult,
    pub outcomes: Vec<ProjectOutcome>,
}

pub struct DonationImpactSimulator<'a> {
    baseline: &'a Baseline,
    params: ClrParams,
    config: SimulatorConfig,
}

impl<'a> DonationImpactSimulator<'a> {
    pub fn new(
        baseline: &'a Baseline,
        params: ClrParams,
        config: SimulatorConfig,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        config.validate()?;
        Ok(Self {
            baseline,
            params,
            config,
        })
    }

    /// Matching run with no additional donation.
    pub fn run_baseline(&self, budget: &ComputeBudget) -> Result<MatchResult, CalcError> {
        let mut result = calculate_from_records(
            &self.baseline.current,
            &self.baseline.previous,
            &self.params,
            budget,
        )?;
        result.diagnostics = self.baseline.diagnostics;
        Ok(result)
    }

    /// Re-run matching with a verified synthetic donation of `amount` to `project`.
    ///
    /// A zero amount adds nothing. Projects without a current-round group
    /// receive no synthetic donation either. Returns `Ok(None)` when the
    /// project is absent from the result set.
    pub fn simulate_donation(
        &self,
        project: ProjectId,
        amount: f64,
        budget: &ComputeBudget,
    ) -> Result<Option<(f64, MatchResult)>, CalcError> {
        let synthetic = if amount != 0.0 && self.baseline.has_current_group(&project) {
            Some(ContributionRecord::synthetic(project, amount).ok_or_else(|| {
                CalcError::Simulation {
                    project,
                    reason: format!("invalid donation amount {amount}"),
                }
            })?)
        } else {
            None
        };

        let mut result = calculate_from_records(
            self.baseline.current.iter().chain(synthetic.iter()),
            &self.baseline.previous,
            &self.params,
            budget,
        )?;
        result.diagnostics = self.baseline.diagnostics;

        Ok(result.clr_amount(&project).map(|clr| (clr, result)))
    }

    /// Prediction curve for `project`, reusing an already computed baseline run.
    pub fn prediction_curve(
        &self,
        project: ProjectId,
        baseline: &MatchResult,
        budget: &ComputeBudget,
    ) -> Result<PredictionCurve, CalcError> {
        let rest: Vec<Option<f64>> = self.config.ladder[1..]
            .par_iter()
            .map(|&amount| {
                self.simulate_donation(project, amount, budget)
                    .map(|found| found.map(|(clr, _)| clr))
            })
            .collect::<Result<_, _>>()?;

        let mut predicted = Vec::with_capacity(self.config.ladder.len());
        predicted.push(baseline.clr_amount(&project));
        predicted.extend(rest);

        Ok(build_curve(project, &self.config.ladder, &predicted))
    }

    /// Curves for every known project, evaluated in parallel.
    ///
    /// Only a failure of the shared baseline run aborts the whole run; a
    /// project that exhausts its own budget yields a failed outcome.
    pub fn predict_all(&self, token: &CancellationToken) -> Result<PredictionRun, CalcError> {
        let projects: Vec<ProjectId> = self.baseline.projects().collect();
        info!(projects = projects.len(), ladder = ?self.config.ladder, "starting prediction run");

        let budget = ComputeBudget::starting_now(token.clone(), self.config.per_project_budget);
        let baseline = self.run_baseline(&budget)?;

        let outcomes: Vec<ProjectOutcome> = projects
            .par_iter()
            .map(|&project| {
                let budget =
                    ComputeBudget::starting_now(token.clone(), self.config.per_project_budget);
                let curve = self.prediction_curve(project, &baseline, &budget);
                match &curve {
                    Ok(c) => debug!(%project, baseline = c.baseline(), estimable = c.estimable, "curve built"),
                    Err(e) => warn!(%project, error = %e, "prediction curve failed"),
                }
                let summary = self
                    .baseline
                    .summary(project, baseline.clr_amount(&project).unwrap_or(0.0));
                ProjectOutcome {
                    project,
                    curve,
                    summary,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.curve.is_err()).count();
        info!(
            projects = outcomes.len(),
            failed,
            pct = baseline.percentage_distributed,
            "prediction run finished"
        );

        Ok(PredictionRun { baseline, outcomes })
    }
}

/// Assemble a curve from the predicted match at each ladder point.
///
/// `predicted[0]` is the baseline. When the baseline and the next
/// [`ESTIMABLE_PROBE_POINTS`]` - 1` points are all absent or zero, every row
/// collapses to `(0, 0, 0)`. Otherwise each row carries its delta against
/// the baseline, with absent predictions read as zero.
pub fn build_curve(project: ProjectId, ladder: &[f64], predicted: &[Option<f64>]) -> PredictionCurve {
    let estimable = predicted
        .iter()
        .take(ESTIMABLE_PROBE_POINTS)
        .any(|p| p.is_some_and(|v| v != 0.0));

    if !estimable {
        return PredictionCurve {
            project,
            points: vec![PredictionPoint::ZERO; ladder.len()],
            estimable: false,
        };
    }

    let base = predicted.first().copied().flatten().unwrap_or(0.0);
    let points = ladder
        .iter()
        .zip(predicted)
        .map(|(&donation, p)| {
            let predicted_match = p.unwrap_or(0.0);
            PredictionPoint {
                donation,
                predicted_match,
                delta: predicted_match - base,
            }
        })
        .collect();

    PredictionCurve {
        project,
        points,
        estimable: true,
    }
}
