//! Compiled expression types.

use crate::{Datum, error::EvalError};

/// A compiled expression represented as a dynamically-dispatched closure.
///
/// The closure reads parameters and `let` bindings from the [`Frame`] and
/// returns the value of the expression. It is `Send + Sync` so one compiled
/// function can serve many worker threads at once.
pub type CompiledExpr = Box<dyn Fn(&mut Frame) -> Result<Datum, EvalError> + Send + Sync>;

/// Per-invocation storage: call arguments first, then `let` slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    slots: Vec<Datum>,
}

impl Frame {
    pub fn new(mut args: Vec<Datum>, frame_size: usize) -> Self {
        if args.len() < frame_size {
            args.resize(frame_size, Datum::Null);
        }
        Self { slots: args }
    }

    #[inline(always)]
    pub fn get(&self, slot: usize) -> &Datum {
        &self.slots[slot]
    }

    #[inline(always)]
    pub fn set(&mut self, slot: usize, value: Datum) {
        self.slots[slot] = value;
    }
}
