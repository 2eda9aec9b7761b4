//! Validation of operator-entered values.

use crate::exposure::ConvergenceRate;
use thiserror::Error;

/// Tokens that leave the exposure adjustment.
pub const QUIT_TOKENS: [&str; 4] = ["q", "quit", "e", "exit"];

/// Smallest rate accepted at the prompt.
pub const MIN_PROMPT_RATE: f64 = 0.01;

/// Malformed or out-of-range operator input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidOperatorInput {
    /// The answer is not a number.
    #[error("invalid input {0:?}: please enter a numeric value")]
    NotNumeric(String),
    /// The number lies outside the accepted range.
    #[error("invalid value {value}: please enter a value between {min} and {max}")]
    OutOfRange {
        /// Value entered.
        value: f64,
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
    },
}

/// Answer to the convergence-rate prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateChoice {
    /// Adjust with this rate.
    Rate(ConvergenceRate),
    /// Skip exposure adjustment entirely.
    Skip,
}

/// Answer to the setpoint prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityChoice {
    /// Converge toward this mean intensity.
    Target(u8),
    /// Abort adjustment and keep the current exposure.
    Abort,
}

/// Returns true for `q`, `quit`, `e` or `exit`, ignoring case and padding.
pub fn is_quit_token(input: &str) -> bool {
    let input = input.trim();
    QUIT_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(input))
}

/// Parses a convergence rate in [0.01, 1] or a quit token.
pub fn parse_convergence_rate(input: &str) -> Result<RateChoice, InvalidOperatorInput> {
    if is_quit_token(input) {
        return Ok(RateChoice::Skip);
    }

    let trimmed = input.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| InvalidOperatorInput::NotNumeric(trimmed.to_owned()))?;

    let out_of_range = InvalidOperatorInput::OutOfRange {
        value,
        min: MIN_PROMPT_RATE,
        max: 1.0,
    };
    if !(MIN_PROMPT_RATE..=1.0).contains(&value) {
        return Err(out_of_range);
    }
    ConvergenceRate::new(value)
        .map(RateChoice::Rate)
        .map_err(|_| out_of_range)
}

/// Parses an integer intensity in [0, 255] or a quit token.
///
/// Zero is accepted here; the controller rejects it as a setpoint.
pub fn parse_target_intensity(input: &str) -> Result<IntensityChoice, InvalidOperatorInput> {
    if is_quit_token(input) {
        return Ok(IntensityChoice::Abort);
    }

    let trimmed = input.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| InvalidOperatorInput::NotNumeric(trimmed.to_owned()))?;

    u8::try_from(value)
        .map(IntensityChoice::Target)
        .map_err(|_| InvalidOperatorInput::OutOfRange {
            value: value as f64,
            min: 0.0,
            max: 255.0,
        })
}
