use std::time::Instant;

use super::Options;
use crate::{
    Datum, Ident, Term,
    error::EvalError,
    term::{Builtin, builtin},
};

/// Tree-walking evaluator for one script invocation.
///
/// Every `check_interval` steps the evaluator compares the clock against the
/// invocation's deadline, so a runaway script stops within a bounded margin
/// after its timeout. A deadline too far out to represent is never checked.
#[derive(Debug)]
pub struct Evaluator<'a> {
    options: &'a Options,
    deadline: Option<Instant>,
    timeout_ms: u64,
    steps: u32,
    depth: u32,
    locals: Vec<(Ident, Datum)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(options: &'a Options, deadline: Option<Instant>, timeout_ms: u64) -> Self {
        Self {
            options,
            deadline,
            timeout_ms,
            steps: 0,
            depth: 0,
            locals: Vec::new(),
        }
    }

    pub fn define(&mut self, ident: Ident, value: Datum) {
        self.locals.push((ident, value));
    }

    pub fn eval(&mut self, term: &Term) -> Result<Datum, EvalError> {
        self.tick()?;

        if self.depth >= self.options.max_depth {
            return Err(EvalError::RecursionError(self.options.max_depth));
        }

        self.depth += 1;
        let result = self.eval_term(term);
        self.depth -= 1;
        result
    }

    fn eval_term(&mut self, term: &Term) -> Result<Datum, EvalError> {
        match term {
            Term::Datum(value) => Ok(value.clone()),
            Term::Var(ident) => self.resolve(*ident),
            Term::MakeArray(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Datum::Array),
            Term::Call(op, args) if op.is_short_circuit() => self.eval_short_circuit(*op, args),
            Term::Call(op, args) => {
                if !op.arity().accepts(args.len()) {
                    return Err(EvalError::InvalidTypes {
                        name: op.name(),
                        args: Vec::new(),
                    });
                }
                let values = args.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
                builtin::apply(*op, values)
            }
            Term::Branch(cond, then, otherwise) => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Term::Let(ident, value, body) => {
                let value = self.eval(value)?;
                self.locals.push((*ident, value));
                let result = self.eval(body);
                self.locals.pop();
                result
            }
            Term::While(cond, body) => {
                while self.eval(cond)?.is_truthy() {
                    self.eval(body)?;
                }
                Ok(Datum::Null)
            }
        }
    }

    fn eval_short_circuit(&mut self, op: Builtin, args: &[Term]) -> Result<Datum, EvalError> {
        let [left, right] = args else {
            return Err(EvalError::InvalidTypes {
                name: op.name(),
                args: Vec::new(),
            });
        };

        let value = self.eval(left)?;
        if value.is_truthy() == (op == Builtin::Or) {
            Ok(value)
        } else {
            self.eval(right)
        }
    }

    #[inline(always)]
    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps = self.steps.wrapping_add(1);
        if self.steps % self.options.check_interval.max(1) == 0
            && self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            tracing::warn!(timeout_ms = self.timeout_ms, steps = self.steps, "script timed out");
            return Err(EvalError::Timeout {
                timeout_ms: self.timeout_ms,
            });
        }
        Ok(())
    }

    fn resolve(&self, ident: Ident) -> Result<Datum, EvalError> {
        self.locals
            .iter()
            .rev()
            .find(|(name, _)| *name == ident)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| EvalError::UndefinedVariable(ident.as_str()))
    }
}
