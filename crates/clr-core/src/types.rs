//! Core matching types: contribution records, round aggregates, results
//! and prediction curves.
//!
//! Identities are opaque keys supplied by the data layer. Contributor ids
//! order lexicographically, which is the ordering the pairwise verified
//! discount relies on.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_AMOUNT;

/// Identifier of a project (grant) competing for matching funds.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a real contributor, as supplied by the data layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContributorId(pub String);

impl ContributorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContributorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Key of a contributor inside a calculation.
///
/// `Synthetic` marks the hypothetical donor injected by the donation-impact
/// simulator. It can never collide with a real id, and it orders after every
/// real contributor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContributorKey {
    Real(ContributorId),
    Synthetic,
}

impl ContributorKey {
    pub fn real(id: impl Into<String>) -> Self {
        Self::Real(ContributorId::new(id))
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic)
    }
}

impl fmt::Display for ContributorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(id) => write!(f, "{id}"),
            Self::Synthetic => f.write_str("<synthetic>"),
        }
    }
}

/// Round a contribution belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    Current,
    Previous,
}

impl Round {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Previous => "previous",
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One contributor's summed giving to a project, as shaped by the data layer.
///
/// Field aliases accept the legacy shape (`id`,
/// `sum_of_each_profiles_contributions`, `is_verified`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RawContribution {
    #[serde(default, alias = "id")]
    pub contributor_id: Option<ContributorId>,
    #[serde(alias = "sum_of_each_profiles_contributions")]
    pub total_amount: f64,
    #[serde(default, alias = "is_verified")]
    pub verified: bool,
}

impl RawContribution {
    pub fn new(contributor_id: impl Into<String>, total_amount: f64, verified: bool) -> Self {
        Self {
            contributor_id: Some(ContributorId::new(contributor_id)),
            total_amount,
            verified,
        }
    }
}

/// All contributions received by one project within a round window.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectGroup {
    pub id: ProjectId,
    #[serde(default)]
    pub contributions: Vec<RawContribution>,
}

/// Flat, validated contribution record. Amount is always within `0..=MAX_AMOUNT`.
#[derive(Clone, Debug, PartialEq)]
pub struct ContributionRecord {
    pub project: ProjectId,
    pub contributor: ContributorKey,
    pub verified: bool,
    amount: f64,
}

impl ContributionRecord {
    /// Build a record, rejecting negative, non-finite or oversized amounts.
    pub fn new(
        project: ProjectId,
        contributor: ContributorKey,
        verified: bool,
        amount: f64,
    ) -> Option<Self> {
        if !(0.0..=MAX_AMOUNT).contains(&amount) {
            return None;
        }
        Some(Self {
            project,
            contributor,
            verified,
            amount,
        })
    }

    /// A fully verified synthetic donation to `project`.
    pub fn synthetic(project: ProjectId, amount: f64) -> Option<Self> {
        Self::new(project, ContributorKey::Synthetic, true, amount)
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }
}

/// Counts of raw contributions excluded during translation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslationDiagnostics {
    /// Entries with no (or an empty) contributor identifier.
    pub missing_contributor: usize,
    /// Entries with a negative, non-finite or oversized amount.
    pub invalid_amount: usize,
}

impl TranslationDiagnostics {
    pub fn dropped(&self) -> usize {
        self.missing_contributor + self.invalid_amount
    }

    pub fn merge(&mut self, other: &TranslationDiagnostics) {
        self.missing_contributor += other.missing_contributor;
        self.invalid_amount += other.invalid_amount;
    }
}

/// Per-project contributor amounts within one round.
pub type ProjectContributions = BTreeMap<ContributorKey, f64>;

/// Decay-weighted sums per project and contributor for one round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundAggregate {
    round: Round,
    projects: BTreeMap<ProjectId, ProjectContributions>,
}

impl RoundAggregate {
    pub fn new(round: Round) -> Self {
        Self {
            round,
            projects: BTreeMap::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    /// Add an already-weighted amount to `(project, contributor)`.
    pub fn add(&mut self, project: ProjectId, contributor: ContributorKey, weighted: f64) {
        *self
            .projects
            .entry(project)
            .or_default()
            .entry(contributor)
            .or_insert(0.0) += weighted;
    }

    /// Contributions to `project`, or `None` when it received nothing this round.
    pub fn project(&self, project: &ProjectId) -> Option<&ProjectContributions> {
        self.projects.get(project).filter(|c| !c.is_empty())
    }

    pub fn projects(&self) -> impl Iterator<Item = (&ProjectId, &ProjectContributions)> {
        self.projects.iter()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Both rounds side by side, the input to pairwise matching.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedAggregate {
    pub current: RoundAggregate,
    pub previous: RoundAggregate,
}

impl CombinedAggregate {
    pub fn new(current: RoundAggregate, previous: RoundAggregate) -> Self {
        debug_assert_eq!(current.round(), Round::Current);
        debug_assert_eq!(previous.round(), Round::Previous);
        Self { current, previous }
    }

    pub fn round(&self, round: Round) -> &RoundAggregate {
        match round {
            Round::Current => &self.current,
            Round::Previous => &self.previous,
        }
    }
}

/// Outcome of one full matching run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// Matching amount per project, after saturation scaling.
    pub matches: BTreeMap<ProjectId, f64>,
    /// Share of the pot handed out, in percent (`100` once saturated).
    pub percentage_distributed: f64,
    /// Sum of project totals before saturation scaling.
    pub unnormalized_total: f64,
    /// Whether the computed demand reached the pot.
    pub saturated: bool,
    pub diagnostics: TranslationDiagnostics,
}

impl MatchResult {
    pub fn clr_amount(&self, project: &ProjectId) -> Option<f64> {
        self.matches.get(project).copied()
    }

    pub fn total_allocated(&self) -> f64 {
        self.matches.values().sum()
    }
}

/// One point on a prediction curve.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PredictionPoint {
    pub donation: f64,
    pub predicted_match: f64,
    pub delta: f64,
}

impl PredictionPoint {
    pub const ZERO: Self = Self {
        donation: 0.0,
        predicted_match: 0.0,
        delta: 0.0,
    };
}

/// Marginal effect of hypothetical donations on one project's match.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionCurve {
    pub project: ProjectId,
    pub points: Vec<PredictionPoint>,
    /// `false` when the curve collapsed to all-zero sentinel rows.
    pub estimable: bool,
}

impl PredictionCurve {
    /// Predicted match with no additional donation.
    pub fn baseline(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.predicted_match)
    }
}

/// Summary metrics published alongside a curve.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub baseline_match: f64,
    pub contributor_count: usize,
    pub amount_received: f64,
}

/// Everything the output collaborator stores for one project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CurveRecord {
    pub project: ProjectId,
    pub curve: PredictionCurve,
    pub last_calc_at: DateTime<Utc>,
    pub next_calc_at: DateTime<Utc>,
    pub summary: Option<ProjectSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_orders_after_real() {
        let real = ContributorKey::real("999999999999");
        assert!(ContributorKey::Synthetic > real);
        assert_ne!(ContributorKey::Synthetic, real);
    }

    #[test]
    fn contributor_ids_compare_lexicographically() {
        assert!(ContributorKey::real("9") > ContributorKey::real("10"));
        assert!(ContributorKey::real("b") > ContributorKey::real("a"));
    }

    #[test]
    fn record_rejects_negative_and_nan() {
        let p = ProjectId(1);
        assert!(ContributionRecord::new(p, ContributorKey::real("a"), true, -1.0).is_none());
        assert!(ContributionRecord::new(p, ContributorKey::real("a"), true, f64::NAN).is_none());
        assert!(ContributionRecord::new(p, ContributorKey::real("a"), true, f64::INFINITY).is_none());
        assert!(ContributionRecord::new(p, ContributorKey::real("a"), true, 1e200).is_none());
        assert!(ContributionRecord::new(p, ContributorKey::real("a"), true, MAX_AMOUNT).is_some());
        let ok = ContributionRecord::new(p, ContributorKey::real("a"), false, 0.0).unwrap();
        assert_eq!(ok.amount(), 0.0);
    }

    #[test]
    fn synthetic_record_is_verified() {
        let rec = ContributionRecord::synthetic(ProjectId(7), 10.0).unwrap();
        assert!(rec.verified);
        assert!(rec.contributor.is_synthetic());
    }

    #[test]
    fn round_aggregate_sums_per_key() {
        let mut agg = RoundAggregate::new(Round::Current);
        agg.add(ProjectId(1), ContributorKey::real("a"), 2.0);
        agg.add(ProjectId(1), ContributorKey::real("a"), 3.0);
        agg.add(ProjectId(1), ContributorKey::real("b"), 1.0);
        let contribs = agg.project(&ProjectId(1)).unwrap();
        assert_eq!(contribs[&ContributorKey::real("a")], 5.0);
        assert_eq!(contribs.len(), 2);
        assert!(agg.project(&ProjectId(2)).is_none());
    }

    #[test]
    fn raw_contribution_accepts_legacy_fields() {
        let json = r#"{"id":"42","sum_of_each_profiles_contributions":12.5,"is_verified":true}"#;
        let raw: RawContribution = serde_json::from_str(json).unwrap();
        assert_eq!(raw, RawContribution::new("42", 12.5, true));
    }

    #[test]
    fn raw_contribution_accepts_null_contributor() {
        let json = r#"{"contributor_id":null,"total_amount":3.0}"#;
        let raw: RawContribution = serde_json::from_str(json).unwrap();
        assert!(raw.contributor_id.is_none());
        assert!(!raw.verified);
    }

    #[test]
    fn project_group_roundtrips_json() {
        let group = ProjectGroup {
            id: ProjectId(5),
            contributions: vec![RawContribution::new("a", 1.0, false)],
        };
        let json = serde_json::to_string(&group).unwrap();
        let back: ProjectGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, group);
    }

    #[test]
    fn curve_baseline_is_first_point() {
        let curve = PredictionCurve {
            project: ProjectId(1),
            points: vec![
                PredictionPoint { donation: 0.0, predicted_match: 4.0, delta: 0.0 },
                PredictionPoint { donation: 1.0, predicted_match: 5.0, delta: 1.0 },
            ],
            estimable: true,
        };
        assert_eq!(curve.baseline(), 4.0);
    }

    #[test]
    fn diagnostics_merge_and_count() {
        let mut a = TranslationDiagnostics { missing_contributor: 1, invalid_amount: 0 };
        a.merge(&TranslationDiagnostics { missing_contributor: 2, invalid_amount: 3 });
        assert_eq!(a.dropped(), 6);
    }
}
