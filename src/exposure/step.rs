//! Multiplicative exposure steps.

use super::ExposureError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fractional step size in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ConvergenceRate(f64);

impl ConvergenceRate {
    /// Creates a rate, rejecting values outside (0, 1].
    pub fn new(rate: f64) -> Result<Self, ExposureError> {
        if rate > 0.0 && rate <= 1.0 {
            Ok(Self(rate))
        } else {
            Err(ExposureError::InvalidRate(rate))
        }
    }

    /// The raw fraction.
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Multiplier applied when increasing exposure.
    #[inline]
    pub fn gain(self) -> f64 {
        1.0 + self.0
    }
}

impl Default for ConvergenceRate {
    fn default() -> Self {
        Self(0.2)
    }
}

impl fmt::Display for ConvergenceRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do when a sample is brighter than the setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StepPolicy {
    /// Divide by `1 + rate` on overshoot, so one step up followed by one
    /// step down returns to the starting exposure.
    #[default]
    Corrective,
    /// Multiply by `1 + rate` on overshoot as well. Exposure can only grow,
    /// so the loop converges from below or not at all.
    IncreaseOnly,
}

impl StepPolicy {
    /// Computes the next exposure time from one brightness sample.
    ///
    /// A sample exactly at the setpoint leaves the exposure unchanged.
    pub fn next_exposure(
        self,
        current_us: f64,
        intensity: f64,
        target: f64,
        rate: ConvergenceRate,
    ) -> f64 {
        match intensity.partial_cmp(&target) {
            Some(Ordering::Less) => current_us * rate.gain(),
            Some(Ordering::Greater) => match self {
                StepPolicy::Corrective => current_us / rate.gain(),
                StepPolicy::IncreaseOnly => current_us * rate.gain(),
            },
            _ => current_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rate_bounds() {
        assert!(ConvergenceRate::new(1.0).is_ok());
        assert!(ConvergenceRate::new(0.01).is_ok());
        assert!(matches!(
            ConvergenceRate::new(0.0),
            Err(ExposureError::InvalidRate(_))
        ));
        assert!(ConvergenceRate::new(1.5).is_err());
        assert!(ConvergenceRate::new(f64::NAN).is_err());
    }

    #[test]
    fn test_corrective_decreases_on_overshoot() {
        let rate = ConvergenceRate::new(0.25).unwrap();
        let next = StepPolicy::Corrective.next_exposure(1000.0, 200.0, 128.0, rate);
        assert_eq!(next, 800.0);
    }

    #[test]
    fn test_increase_only_grows_on_overshoot() {
        let rate = ConvergenceRate::new(0.25).unwrap();
        let next = StepPolicy::IncreaseOnly.next_exposure(1000.0, 200.0, 128.0, rate);
        assert_eq!(next, 1250.0);
    }

    #[test]
    fn test_at_setpoint_unchanged() {
        let rate = ConvergenceRate::default();
        for policy in [StepPolicy::Corrective, StepPolicy::IncreaseOnly] {
            assert_eq!(policy.next_exposure(500.0, 128.0, 128.0, rate), 500.0);
        }
    }

    #[test]
    fn test_cli_names_match_config_names() {
        assert_eq!(
            StepPolicy::from_str("increase-only", false).unwrap(),
            StepPolicy::IncreaseOnly
        );
        assert_eq!(
            StepPolicy::from_str("corrective", false).unwrap(),
            StepPolicy::Corrective
        );
    }

    proptest! {
        #[test]
        fn prop_underexposed_step_strictly_increases(
            rate in 0.0001f64..=1.0,
            current in 1.0f64..1.0e6,
            intensity in 0.0f64..127.9,
        ) {
            let rate = ConvergenceRate::new(rate).unwrap();
            for policy in [StepPolicy::Corrective, StepPolicy::IncreaseOnly] {
                let next = policy.next_exposure(current, intensity, 128.0, rate);
                prop_assert!(next > current);
                prop_assert_eq!(next, current * (1.0 + rate.get()));
            }
        }

        #[test]
        fn prop_corrective_step_round_trips(
            rate in 0.01f64..=1.0,
            current in 1.0f64..1.0e6,
        ) {
            let rate = ConvergenceRate::new(rate).unwrap();
            let up = StepPolicy::Corrective.next_exposure(current, 10.0, 128.0, rate);
            let back = StepPolicy::Corrective.next_exposure(up, 250.0, 128.0, rate);
            prop_assert!((back - current).abs() <= current * 1e-12);
        }
    }
}
