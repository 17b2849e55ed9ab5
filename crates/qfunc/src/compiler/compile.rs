//! Main compilation logic for transforming terms to compiled expressions.

use super::compiled::{CompiledExpr, Frame};
use crate::error::{CompileError, EvalError};
use crate::scope::{Binding, CompileEnv};
use crate::term::{Builtin, Term, builtin};
use crate::Datum;

/// Intermediate result: a value known at compile time, or code to run.
enum Compiled {
    Const(Datum),
    Expr(CompiledExpr),
}

impl Compiled {
    fn into_expr(self) -> CompiledExpr {
        match self {
            Compiled::Const(value) => Box::new(move |_frame| Ok(value.clone())),
            Compiled::Expr(expr) => expr,
        }
    }
}

/// Compiler for transforming terms into compiled closures.
///
/// Terms built only from literals and captured variables are folded while
/// compiling, so they cost a clone at run time.
#[derive(Debug)]
pub struct Compiler<'e, 's> {
    env: &'e mut CompileEnv<'s>,
}

impl<'e, 's> Compiler<'e, 's> {
    pub fn new(env: &'e mut CompileEnv<'s>) -> Self {
        Self { env }
    }

    /// Compiles `term` against the environment; the environment's frame size
    /// afterwards is the number of slots the result needs.
    pub fn compile(&mut self, term: &Term) -> Result<CompiledExpr, CompileError> {
        self.compile_term(term).map(Compiled::into_expr)
    }

    fn compile_term(&mut self, term: &Term) -> Result<Compiled, CompileError> {
        match term {
            Term::Datum(value) => Ok(Compiled::Const(value.clone())),

            Term::Var(ident) => match self.env.resolve(*ident)? {
                Binding::Slot(slot) => Ok(Compiled::Expr(Box::new(move |frame: &mut Frame| {
                    Ok(frame.get(slot).clone())
                }))),
                Binding::Captured(value) => Ok(Compiled::Const(value.clone())),
            },

            Term::MakeArray(items) => {
                let compiled = items
                    .iter()
                    .map(|item| self.compile_term(item))
                    .collect::<Result<Vec<_>, _>>()?;

                match all_const(compiled) {
                    Ok(values) => Ok(Compiled::Const(Datum::Array(values))),
                    Err(exprs) => Ok(Compiled::Expr(Box::new(move |frame| {
                        exprs
                            .iter()
                            .map(|expr| expr(frame))
                            .collect::<Result<Vec<_>, _>>()
                            .map(Datum::Array)
                    }))),
                }
            }

            Term::Call(op, args) => {
                let arity = op.arity();
                if !arity.accepts(args.len()) {
                    return Err(CompileError::InvalidNumberOfArguments {
                        name: op.name(),
                        expected: arity,
                        got: args.len(),
                    });
                }

                let compiled = args
                    .iter()
                    .map(|arg| self.compile_term(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                if op.is_short_circuit() {
                    Ok(compile_short_circuit(*op, compiled))
                } else {
                    Ok(compile_strict(*op, compiled))
                }
            }

            Term::Branch(cond, then, otherwise) => {
                let cond = self.compile_term(cond)?;
                let then = self.compile_term(then)?;
                let otherwise = self.compile_term(otherwise)?;

                match cond {
                    Compiled::Const(value) if value.is_truthy() => Ok(then),
                    Compiled::Const(_) => Ok(otherwise),
                    Compiled::Expr(cond) => {
                        let then = then.into_expr();
                        let otherwise = otherwise.into_expr();
                        Ok(Compiled::Expr(Box::new(move |frame| {
                            if cond(frame)?.is_truthy() {
                                then(frame)
                            } else {
                                otherwise(frame)
                            }
                        })))
                    }
                }
            }

            Term::Let(ident, value, body) => {
                let value = self.compile_term(value)?;
                let slot = self.env.push(*ident);
                let body = self.compile_term(body);
                self.env.pop();
                let body = body?;

                if let (Compiled::Const(_), Compiled::Const(_)) = (&value, &body) {
                    return Ok(body);
                }

                let value = value.into_expr();
                let body = body.into_expr();
                Ok(Compiled::Expr(Box::new(move |frame| {
                    let bound = value(frame)?;
                    frame.set(slot, bound);
                    body(frame)
                })))
            }

            Term::While(..) => Err(CompileError::UnsupportedTerm("while")),
        }
    }
}

fn compile_short_circuit(op: Builtin, mut compiled: Vec<Compiled>) -> Compiled {
    let right = compiled.pop();
    let left = compiled.pop();
    let (Some(left), Some(right)) = (left, right) else {
        unreachable!("arity checked before compiling {}", op)
    };

    // `and` stops on a falsy left operand, `or` on a truthy one
    let stops = move |value: &Datum| value.is_truthy() == (op == Builtin::Or);

    match left {
        Compiled::Const(value) if stops(&value) => Compiled::Const(value),
        Compiled::Const(_) => right,
        Compiled::Expr(left) => {
            let right = right.into_expr();
            Compiled::Expr(Box::new(move |frame| {
                let value = left(frame)?;
                if stops(&value) { Ok(value) } else { right(frame) }
            }))
        }
    }
}

fn compile_strict(op: Builtin, compiled: Vec<Compiled>) -> Compiled {
    match all_const(compiled) {
        Ok(values) => match builtin::apply(op, values) {
            Ok(value) => Compiled::Const(value),
            // the fault belongs to the invocation, not to compilation
            Err(err) => Compiled::Expr(Box::new(move |_frame| Err::<Datum, EvalError>(err.clone()))),
        },
        Err(exprs) => Compiled::Expr(Box::new(move |frame| {
            let values = exprs.iter().map(|expr| expr(frame)).collect::<Result<Vec<_>, _>>()?;
            builtin::apply(op, values)
        })),
    }
}

/// Returns the constant values if every operand is known, otherwise all
/// operands as closures.
fn all_const(compiled: Vec<Compiled>) -> Result<Vec<Datum>, Vec<CompiledExpr>> {
    if compiled.iter().all(|c| matches!(c, Compiled::Const(_))) {
        Ok(compiled
            .into_iter()
            .filter_map(|c| match c {
                Compiled::Const(value) => Some(value),
                Compiled::Expr(_) => None,
            })
            .collect())
    } else {
        Err(compiled.into_iter().map(Compiled::into_expr).collect())
    }
}
