//! Executable functions produced from a [`FuncRepr`].

use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use crate::{
    Backtrace, Datum, Shared,
    compiler::{CompiledExpr, Compiler, Frame},
    error::{CompileError, EvalError},
    repr::{FuncRepr, ScriptRepr, TermRepr},
    script::{Options, Script, ScriptEngine, parse},
};

/// A compiled function. Immutable once built and safe to call from many
/// threads at once.
#[derive(Debug)]
pub enum Func {
    Term(TermFunc),
    Script(ScriptFunc),
}

pub struct TermFunc {
    repr: TermRepr,
    expr: CompiledExpr,
    frame_size: usize,
}

impl Debug for TermFunc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermFunc")
            .field("repr", &self.repr)
            .field("frame_size", &self.frame_size)
            .finish_non_exhaustive()
    }
}

impl TermFunc {
    pub fn repr(&self) -> &TermRepr {
        &self.repr
    }

    fn call(&self, args: &[Datum]) -> Result<Datum, EvalError> {
        if args.len() != self.repr.arity() {
            return Err(EvalError::InvalidNumberOfArguments {
                expected: self.repr.arity(),
                got: args.len(),
            });
        }

        let mut frame = Frame::new(args.to_vec(), self.frame_size);
        (self.expr)(&mut frame)
    }
}

#[derive(Debug)]
pub struct ScriptFunc {
    repr: ScriptRepr,
    // parse faults belong to the invocation, so they are kept until called
    script: Result<Script, EvalError>,
    engine: ScriptEngine,
}

impl ScriptFunc {
    pub fn repr(&self) -> &ScriptRepr {
        &self.repr
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.repr.timeout_ms)
    }

    pub fn options(&self) -> &Options {
        self.engine.options()
    }

    fn call(&self, args: &[Datum]) -> Result<Datum, EvalError> {
        let script = self.script.as_ref().map_err(Clone::clone)?;
        self.engine.run(script, self.timeout(), args)
    }
}

impl Func {
    pub fn call(&self, args: &[Datum]) -> Result<Datum, EvalError> {
        tracing::trace!(kind = self.kind(), args = args.len(), "calling function");

        match self {
            Func::Term(func) => func.call(args),
            Func::Script(func) => func.call(args),
        }
    }

    pub fn backtrace(&self) -> &Shared<Backtrace> {
        match self {
            Func::Term(func) => &func.repr.backtrace,
            Func::Script(func) => &func.repr.backtrace,
        }
    }

    /// Number of arguments the function takes, if it declares them.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Func::Term(func) => Some(func.repr.arity()),
            Func::Script(func) => match &func.script {
                Ok(script) if !script.params.is_empty() => Some(script.params.len()),
                _ => None,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Func::Term(_) => "term",
            Func::Script(_) => "script",
        }
    }

    /// The representation this function was compiled from.
    pub fn to_repr(&self) -> FuncRepr {
        match self {
            Func::Term(func) => FuncRepr::Term(func.repr.clone()),
            Func::Script(func) => FuncRepr::Script(func.repr.clone()),
        }
    }
}

/// Compiles `repr` into a shareable function.
pub fn compile(repr: &FuncRepr) -> Result<Shared<Func>, CompileError> {
    compile_with(repr, &Options::default())
}

/// Like [`compile`], with `options` governing how a script body runs.
pub fn compile_with(repr: &FuncRepr, options: &Options) -> Result<Shared<Func>, CompileError> {
    let func = match repr {
        FuncRepr::Term(repr) => compile_term(repr).map(Func::Term)?,
        FuncRepr::Script(repr) => Func::Script(ScriptFunc {
            repr: repr.clone(),
            script: parse(&repr.source),
            engine: ScriptEngine::new(options.clone()),
        }),
    };

    tracing::debug!(
        target: "qfunc::compile",
        kind = func.kind(),
        backtrace = %repr.backtrace(),
        "compiled function"
    );

    Ok(Shared::new(func))
}

fn compile_term(repr: &TermRepr) -> Result<TermFunc, CompileError> {
    let mut env = repr.captured_scope.compute_visibility(&repr.arg_names)?;
    let expr = Compiler::new(&mut env).compile(&repr.body)?;

    Ok(TermFunc {
        frame_size: env.frame_size(),
        repr: repr.clone(),
        expr,
    })
}
