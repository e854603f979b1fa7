//! Collaborator interfaces around the matching engine.
//!
//! - [`ContributionSource`]: supplies pre-shaped round data (data layer implements)
//! - [`EstimateSink`]: stores prediction curves and run metrics (persistence layer implements)

use std::collections::BTreeSet;

use crate::error::{PersistenceError, SourceError};
use crate::types::{CurveRecord, ProjectGroup, ProjectId};

/// Supplier of per-project contribution groups for a round window.
pub trait ContributionSource: Send + Sync {
    /// Groups for the round being matched.
    fn current_round(&self) -> Result<Vec<ProjectGroup>, SourceError>;

    /// Groups for the chained previous round.
    ///
    /// Default implementation returns no groups (unchained round).
    fn previous_round(&self) -> Result<Vec<ProjectGroup>, SourceError> {
        Ok(Vec::new())
    }

    /// Every project eligible this round, including those nobody gave to.
    ///
    /// Default implementation returns no ids; only projects with a group
    /// are then predicted.
    fn eligible_projects(&self) -> Result<BTreeSet<ProjectId>, SourceError> {
        Ok(BTreeSet::new())
    }
}

/// Destination for computed prediction curves and per-run metrics.
///
/// Implementations must be safe to call once per project; a failure for one
/// project must not poison later calls.
pub trait EstimateSink: Send + Sync {
    /// Store the curve, timestamps and optional summary for one project.
    fn save_curve(&self, record: &CurveRecord) -> Result<(), PersistenceError>;

    /// Store the share of the pot distributed by this run, in percent.
    fn save_distribution_pct(&self, percentage: f64) -> Result<(), PersistenceError>;
}
