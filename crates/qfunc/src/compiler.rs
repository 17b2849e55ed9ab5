//! Closure-based compiler for function bodies.
//!
//! Each [`Term`](crate::Term) is turned into a dynamically-dispatched closure
//! once, when a function is compiled. Names are resolved at that point:
//! captured variables become constants and parameters become frame slots, so
//! invoking the result per row does no lookups by name.
//!
//! ## Example
//!
//! ```rust
//! use qfunc::{Builtin, CompileEnv, Datum, Ident, Term, VarScope, compiler::{Compiler, Frame}};
//!
//! let scope = VarScope::new().with_var(Ident::new("offset"), Datum::from(10));
//! let mut env = scope.compute_visibility(&[Ident::new("x")]).unwrap();
//! let body = Term::call(Builtin::Add, vec![Term::var("x"), Term::var("offset")]);
//! let compiled = Compiler::new(&mut env).compile(&body).unwrap();
//!
//! let mut frame = Frame::new(vec![Datum::from(1)], env.frame_size());
//! assert_eq!(compiled(&mut frame).unwrap(), Datum::from(11));
//! ```

mod compile;
pub(crate) mod compiled;

pub use compile::Compiler;
pub use compiled::{CompiledExpr, Frame};
