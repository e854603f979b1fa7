//! Matching constants. All monetary values share the unit of the matching pot.

/// Weight applied to previous-round contributions when blended with the
/// current round.
pub const PREVIOUS_ROUND_DECAY: f64 = 1.0 / 3.0;

/// Weight applied to current-round contributions.
pub const CURRENT_ROUND_DECAY: f64 = 1.0;

/// Largest contribution amount accepted into a calculation.
///
/// Keeps every `sqrt(v1) * sqrt(v2)` product and the per-project sums far
/// from `f64` overflow.
pub const MAX_AMOUNT: f64 = 1e15;

/// Default discount denominator for unverified pairs and self-pairs.
pub const DEFAULT_UV_THRESHOLD: f64 = 5.0;

/// Candidate donation amounts evaluated for every prediction curve.
///
/// The first entry is the baseline and must be zero.
pub const PREDICTION_LADDER: [f64; 6] = [0.0, 1.0, 10.0, 100.0, 1000.0, 10000.0];

/// Number of leading ladder points (baseline included) that decide whether
/// a curve can be estimated at all.
pub const ESTIMABLE_PROBE_POINTS: usize = 4;

/// Minutes between a calculation and the next scheduled one.
pub const DEFAULT_CALC_INTERVAL_MINUTES: i64 = 20;

/// Percentage reported once the computed demand saturates the pot.
pub const FULL_DISTRIBUTION_PCT: f64 = 100.0;

/// Absolute tolerance used when comparing matching amounts.
pub const MATCH_TOLERANCE: f64 = 1e-9;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_anchored_at_zero() {
        assert_eq!(PREDICTION_LADDER[0], 0.0);
    }

    #[test]
    fn ladder_strictly_increasing() {
        for w in PREDICTION_LADDER.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn probe_points_fit_ladder() {
        assert!(ESTIMABLE_PROBE_POINTS <= PREDICTION_LADDER.len());
    }

    #[test]
    fn max_amount_squared_stays_finite() {
        assert!((MAX_AMOUNT * MAX_AMOUNT).is_finite());
        assert!(PREDICTION_LADDER.iter().all(|&d| d <= MAX_AMOUNT));
    }

    #[test]
    fn previous_decay_is_one_third() {
        assert!((PREVIOUS_ROUND_DECAY * 3.0 - 1.0).abs() < MATCH_TOLERANCE);
    }
}
