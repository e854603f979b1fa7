//! Scalar parameters of a matching run.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_UV_THRESHOLD, PREVIOUS_ROUND_DECAY};
use crate::error::ConfigError;

fn default_uv_threshold() -> f64 {
    DEFAULT_UV_THRESHOLD
}

fn default_round_decay() -> f64 {
    PREVIOUS_ROUND_DECAY
}

/// Thresholds, pot size and previous-round weight for one matching run.
///
/// Call [`validate`](Self::validate) before any pairwise work: every
/// threshold divides a pair total, and the pot divides the saturation sum.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ClrParams {
    /// Discount denominator for verified contributor pairs.
    pub v_threshold: f64,
    /// Discount denominator for unverified pairs and self-pairs.
    #[serde(default = "default_uv_threshold")]
    pub uv_threshold: f64,
    /// Size of the matching pool.
    pub total_pot: f64,
    /// Weight of previous-round contributions.
    #[serde(default = "default_round_decay")]
    pub round_decay: f64,
}

impl ClrParams {
    pub fn new(v_threshold: f64, total_pot: f64) -> Self {
        Self {
            v_threshold,
            uv_threshold: DEFAULT_UV_THRESHOLD,
            total_pot,
            round_decay: PREVIOUS_ROUND_DECAY,
        }
    }

    pub fn with_uv_threshold(mut self, uv_threshold: f64) -> Self {
        self.uv_threshold = uv_threshold;
        self
    }

    pub fn with_round_decay(mut self, round_decay: f64) -> Self {
        self.round_decay = round_decay;
        self
    }

    /// Reject parameters that would divide by zero or produce NaN.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.total_pot.is_finite() && self.total_pot > 0.0) {
            return Err(ConfigError::NonPositivePot(self.total_pot));
        }
        if !(self.v_threshold.is_finite() && self.v_threshold > 0.0) {
            return Err(ConfigError::NonPositiveVThreshold(self.v_threshold));
        }
        if !(self.uv_threshold.is_finite() && self.uv_threshold > 0.0) {
            return Err(ConfigError::NonPositiveUvThreshold(self.uv_threshold));
        }
        if !(self.round_decay.is_finite() && self.round_decay >= 0.0) {
            return Err(ConfigError::InvalidRoundDecay(self.round_decay));
        }
        Ok(())
    }

    /// Denominator for a pair, depending on whether it earns the verified discount.
    pub fn threshold(&self, verified_pair: bool) -> f64 {
        if verified_pair {
            self.v_threshold
        } else {
            self.uv_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_uses_canonical_defaults() {
        let p = ClrParams::new(25_000.0, 100_000.0);
        assert_eq!(p.uv_threshold, 5.0);
        assert_eq!(p.round_decay, PREVIOUS_ROUND_DECAY);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_pot_rejected() {
        let p = ClrParams::new(1.0, 0.0);
        assert_eq!(p.validate(), Err(ConfigError::NonPositivePot(0.0)));
    }

    #[test]
    fn negative_v_threshold_rejected() {
        let p = ClrParams::new(-1.0, 10.0);
        assert_eq!(p.validate(), Err(ConfigError::NonPositiveVThreshold(-1.0)));
    }

    #[test]
    fn zero_uv_threshold_rejected() {
        let p = ClrParams::new(1.0, 10.0).with_uv_threshold(0.0);
        assert_eq!(p.validate(), Err(ConfigError::NonPositiveUvThreshold(0.0)));
    }

    #[test]
    fn nan_pot_rejected() {
        let p = ClrParams::new(1.0, f64::NAN);
        assert!(matches!(p.validate(), Err(ConfigError::NonPositivePot(_))));
    }

    #[test]
    fn negative_decay_rejected() {
        let p = ClrParams::new(1.0, 10.0).with_round_decay(-0.5);
        assert_eq!(p.validate(), Err(ConfigError::InvalidRoundDecay(-0.5)));
    }

    #[test]
    fn threshold_selects_branch() {
        let p = ClrParams::new(25_000.0, 1.0);
        assert_eq!(p.threshold(true), 25_000.0);
        assert_eq!(p.threshold(false), 5.0);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let p: ClrParams = serde_json::from_str(r#"{"v_threshold":10.0,"total_pot":500.0}"#).unwrap();
        assert_eq!(p, ClrParams::new(10.0, 500.0));
    }

    proptest! {
        #[test]
        fn positive_finite_params_validate(
            v in 1e-6f64..1e9,
            uv in 1e-6f64..1e9,
            pot in 1e-6f64..1e12,
            decay in 0.0f64..1.0,
        ) {
            let p = ClrParams::new(v, pot).with_uv_threshold(uv).with_round_decay(decay);
            prop_assert!(p.validate().is_ok());
        }
    }
}
