//! Embedded scripting language evaluated under a wall-clock timeout.
//!
//! A script is an optional parameter header followed by one expression:
//!
//! ```text
//! fn(acc, row): if row.n > acc then row.n else acc
//! ```
//!
//! Without a header the call arguments are bound to `args` as an array.

mod eval;
mod parser;

use std::time::{Duration, Instant};

use crate::{Datum, Ident, error::EvalError};
use eval::Evaluator;
pub use parser::{MAX_NESTING, Script, parse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Number of evaluation steps between two deadline checks.
    pub check_interval: u32,
    /// Maximum expression nesting the evaluator accepts.
    pub max_depth: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            check_interval: 64,
            max_depth: 256,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptEngine {
    options: Options,
}

impl ScriptEngine {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Parses and runs `source` with `args`, failing with
    /// [`EvalError::Timeout`] once `timeout` has elapsed.
    pub fn evaluate(&self, source: &str, timeout: Duration, args: &[Datum]) -> Result<Datum, EvalError> {
        let deadline = Instant::now().checked_add(timeout);
        let script = parse(source)?;
        self.run_until(&script, deadline, timeout.as_millis() as u64, args)
    }

    /// Runs an already parsed script; the clock starts now.
    pub fn run(&self, script: &Script, timeout: Duration, args: &[Datum]) -> Result<Datum, EvalError> {
        self.run_until(script, Instant::now().checked_add(timeout), timeout.as_millis() as u64, args)
    }

    fn run_until(
        &self,
        script: &Script,
        deadline: Option<Instant>,
        timeout_ms: u64,
        args: &[Datum],
    ) -> Result<Datum, EvalError> {
        let mut evaluator = Evaluator::new(&self.options, deadline, timeout_ms);

        if script.params.is_empty() {
            evaluator.define(Ident::new("args"), Datum::Array(args.to_vec()));
        } else if script.params.len() != args.len() {
            return Err(EvalError::InvalidNumberOfArguments {
                expected: script.params.len(),
                got: args.len(),
            });
        } else {
            script
                .params
                .iter()
                .zip(args)
                .for_each(|(param, arg)| evaluator.define(*param, arg.clone()));
        }

        evaluator.eval(&script.body)
    }
}
