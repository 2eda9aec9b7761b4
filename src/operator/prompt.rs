//! Line-based interactive driver around the parse functions.

use super::{
    parse_convergence_rate, parse_target_intensity, IntensityChoice, InvalidOperatorInput,
    RateChoice,
};
use std::io::{self, BufRead, Write};

/// Source of the two exposure parameters.
pub trait Operator {
    /// Asks for the convergence rate.
    fn convergence_rate(&mut self) -> io::Result<RateChoice>;

    /// Asks for the target intensity.
    fn target_intensity(&mut self) -> io::Result<IntensityChoice>;
}

/// Parameters fixed up front, e.g. from command-line flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedOperator {
    /// Answer to the convergence rate prompt.
    pub rate: RateChoice,
    /// Answer to the target intensity prompt.
    pub intensity: IntensityChoice,
}

impl Operator for FixedOperator {
    fn convergence_rate(&mut self) -> io::Result<RateChoice> {
        Ok(self.rate)
    }

    fn target_intensity(&mut self) -> io::Result<IntensityChoice> {
        Ok(self.intensity)
    }
}

/// Prompts on `output` and reads answers from `input`, re-prompting until
/// the answer validates. End of input counts as a quit token.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    suggested_rate: f64,
    suggested_intensity: u8,
    reprompts: usize,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompter bound to the process terminal.
    pub fn stdio(suggested_rate: f64, suggested_intensity: u8) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), suggested_rate, suggested_intensity)
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Creates a prompter that shows the given suggestions.
    pub fn new(input: R, output: W, suggested_rate: f64, suggested_intensity: u8) -> Self {
        Self {
            input,
            output,
            suggested_rate,
            suggested_intensity,
            reprompts: 0,
        }
    }

    /// Number of answers rejected so far.
    pub fn reprompts(&self) -> usize {
        self.reprompts
    }

    /// Consumes the prompter and returns the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    fn ask<T>(
        &mut self,
        prompt: &str,
        parse: impl Fn(&str) -> Result<T, InvalidOperatorInput>,
        on_eof: T,
    ) -> io::Result<T> {
        let mut line = String::new();
        loop {
            write!(self.output, "{prompt}")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(on_eof);
            }

            match parse(&line) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.reprompts += 1;
                    tracing::debug!(error = %e, "Rejected operator input");
                    writeln!(self.output, "{e}")?;
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> Operator for Prompter<R, W> {
    fn convergence_rate(&mut self) -> io::Result<RateChoice> {
        let prompt = format!(
            "Set the convergence rate between 0.01 and 1.\n\
             Quit with 'q', 'quit', 'e' or 'exit'.\n\
             Convergence rate (suggested value = {}): ",
            self.suggested_rate
        );
        let choice = self.ask(&prompt, parse_convergence_rate, RateChoice::Skip)?;
        if choice == RateChoice::Skip {
            writeln!(self.output, "Exiting exposure adjustment.")?;
        }
        Ok(choice)
    }

    fn target_intensity(&mut self) -> io::Result<IntensityChoice> {
        let prompt = format!(
            "Set the desired intensity between 0 and 255.\n\
             Quit with 'q', 'quit', 'e' or 'exit'.\n\
             Intensity (suggested value = {}): ",
            self.suggested_intensity
        );
        let choice = self.ask(&prompt, parse_target_intensity, IntensityChoice::Abort)?;
        if choice == IntensityChoice::Abort {
            writeln!(self.output, "Exiting exposure adjustment.")?;
        }
        Ok(choice)
    }
}
