//! Operator interaction.
//!
//! Validation is pure ([`parse_convergence_rate`], [`parse_target_intensity`])
//! and testable without a terminal; [`Prompter`] is the thin interactive
//! loop around it.

mod parse;
mod prompt;

pub use parse::{
    is_quit_token, parse_convergence_rate, parse_target_intensity, IntensityChoice,
    InvalidOperatorInput, RateChoice, MIN_PROMPT_RATE, QUIT_TOKENS,
};
pub use prompt::{FixedOperator, Operator, Prompter};
