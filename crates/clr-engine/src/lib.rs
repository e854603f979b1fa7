//! # clr-engine: Pairwise quadratic-funding (CLR) matching.
//!
//! All calculations are pure, in-memory and deterministic for a given input.
//!
//! Pipeline, leaves first:
//! - **Translation**: pre-shaped project groups are flattened into validated
//!   contribution records; unusable entries are dropped and counted.
//! - **Verification**: contributors verified in either round form the set that
//!   may earn the generous verified-pair threshold.
//! - **Aggregation**: amounts are summed per project and contributor, with the
//!   previous round weighted by `round_decay` (1/3 by default).
//! - **Pair totals**: an asymmetric contributor × contributor matrix of
//!   accumulated `sqrt(v1 * v2)` pressure across all projects.
//! - **Calculation**: each project's pairwise sum is discounted by its pair
//!   totals, then all totals are scaled down if they exceed the pot.
//! - **Simulation**: hypothetical verified donations are overlaid on a shared
//!   baseline to build per-project prediction curves, in parallel.

pub mod aggregate;
pub mod calculator;
pub mod orchestrator;
pub mod pair_totals;
pub mod publish;
pub mod shaping;
pub mod simulator;
pub mod translate;
pub mod verification;

pub use orchestrator::{calculate_from_records, run_clr_calcs, run_clr_calcs_with_budget};
pub use pair_totals::PairTotalMatrix;
pub use publish::{estimate, MemorySink, PublishFailure, PublishReport, Publisher};
pub use simulator::{Baseline, DonationImpactSimulator, PredictionRun, ProjectOutcome, SimulatorConfig};
pub use verification::VerifiedSet;
