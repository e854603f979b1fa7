//! Hand-off of prediction results to an [`EstimateSink`].
//!
//! Each project is stored independently: a failing project is logged and
//! recorded in the [`PublishReport`], and the remaining projects are still
//! stored.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use clr_core::cancellation::CancellationToken;
use clr_core::constants::DEFAULT_CALC_INTERVAL_MINUTES;
use clr_core::error::{ClrError, PersistenceError};
use clr_core::params::ClrParams;
use clr_core::traits::{ContributionSource, EstimateSink};
use clr_core::types::{CurveRecord, ProjectId};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::simulator::{Baseline, DonationImpactSimulator, PredictionRun, SimulatorConfig};

/// Why a project (or the run metric) was not stored.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishFailure {
    /// The curve could not be computed, so nothing was handed to the sink.
    Computation { project: ProjectId, reason: String },
    /// The sink rejected the project's record.
    Curve { project: ProjectId, error: PersistenceError },
    /// The sink rejected the distribution percentage.
    Distribution(PersistenceError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    pub stored: usize,
    pub failures: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Publisher<'a> {
    sink: &'a dyn EstimateSink,
    calc_interval: TimeDelta,
}

impl<'a> Publisher<'a> {
    pub fn new(sink: &'a dyn EstimateSink) -> Self {
        Self {
            sink,
            calc_interval: TimeDelta::minutes(DEFAULT_CALC_INTERVAL_MINUTES),
        }
    }

    pub fn with_calc_interval(mut self, calc_interval: TimeDelta) -> Self {
        self.calc_interval = calc_interval;
        self
    }

    /// Store every computed curve and the run's distribution percentage.
    ///
    /// A next calculation time beyond the representable range is clamped to
    /// the latest one.
    pub fn publish(&self, run: &PredictionRun, now: DateTime<Utc>) -> PublishReport {
        let mut report = PublishReport::default();
        let next_calc_at = now
            .checked_add_signed(self.calc_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        for outcome in &run.outcomes {
            let curve = match &outcome.curve {
                Ok(curve) => curve,
                Err(e) => {
                    report.failures.push(PublishFailure::Computation {
                        project: outcome.project,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let record = CurveRecord {
                project: outcome.project,
                curve: curve.clone(),
                last_calc_at: now,
                next_calc_at,
                summary: Some(outcome.summary.clone()),
            };

            match self.sink.save_curve(&record) {
                Ok(()) => report.stored += 1,
                Err(error) => {
                    warn!(project = %outcome.project, %error, "failed to store prediction curve");
                    report.failures.push(PublishFailure::Curve {
                        project: outcome.project,
                        error,
                    });
                }
            }
        }

        if let Err(error) = self
            .sink
            .save_distribution_pct(run.baseline.percentage_distributed)
        {
            warn!(%error, "failed to store distribution percentage");
            report.failures.push(PublishFailure::Distribution(error));
        }

        info!(
            stored = report.stored,
            failures = report.failures.len(),
            "published prediction curves"
        );
        report
    }
}

/// Load both rounds from `source`, predict every project and publish.
///
/// Source, configuration and baseline failures abort the run. Failures of
/// single projects only show up in the returned report.
pub fn estimate(
    source: &dyn ContributionSource,
    publisher: &Publisher<'_>,
    params: ClrParams,
    config: SimulatorConfig,
    token: &CancellationToken,
    now: DateTime<Utc>,
) -> Result<(PredictionRun, PublishReport), ClrError> {
    let current = source.current_round()?;
    let previous = source.previous_round()?;
    let eligible = source.eligible_projects()?;
    info!(
        current = current.len(),
        previous = previous.len(),
        eligible = eligible.len(),
        "loaded project groups"
    );

    let baseline = Baseline::new(&current, &previous).with_eligible(eligible);
    let simulator = DonationImpactSimulator::new(&baseline, params, config)?;
    let run = simulator.predict_all(token)?;
    let report = publisher.publish(&run, now);
    Ok((run, report))
}

/// In-memory sink, optionally rejecting selected projects.
#[derive(Debug, Default)]
pub struct MemorySink {
    curves: Mutex<Vec<CurveRecord>>,
    percentages: Mutex<Vec<f64>>,
    reject: BTreeSet<ProjectId>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails to store any of `projects`.
    pub fn rejecting(projects: impl IntoIterator<Item = ProjectId>) -> Self {
        Self {
            reject: projects.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn curves(&self) -> Vec<CurveRecord> {
        self.curves.lock().clone()
    }

    pub fn percentages(&self) -> Vec<f64> {
        self.percentages.lock().clone()
    }
}

impl EstimateSink for MemorySink {
    fn save_curve(&self, record: &CurveRecord) -> Result<(), PersistenceError> {
        if self.reject.contains(&record.project) {
            return Err(PersistenceError::Curve {
                project: record.project,
                reason: "rejected".to_string(),
            });
        }
        self.curves.lock().push(record.clone());
        Ok(())
    }

    fn save_distribution_pct(&self, percentage: f64) -> Result<(), PersistenceError> {
        self.percentages.lock().push(percentage);
        Ok(())
    }
}
