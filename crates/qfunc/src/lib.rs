//! `qfunc` ships user functions between the nodes of a query engine.
//!
//! A function is described by a [`FuncRepr`]: either a [`Term`] body closed
//! over a captured [`VarScope`], or script source run by the embedded
//! [`ScriptEngine`](script::ScriptEngine) under a timeout. A [`WireFunc`]
//! pairs that description with the function compiled from it, so a receiving
//! node compiles once and then calls the result for every row.
//!
//! ## Examples
//!
//! ```rust
//! use qfunc::{Backtrace, Builtin, Datum, Ident, Shared, Term, WireFunc};
//!
//! let body = Term::call(Builtin::Add, vec![Term::var("row"), Term::datum(1)]);
//! let func = WireFunc::from_body(
//!     Shared::new(body),
//!     vec![Ident::new("row")],
//!     Shared::new(Backtrace::empty()),
//! )
//! .unwrap();
//!
//! let bytes = func.to_bytes().unwrap();
//! let received = WireFunc::from_bytes(&bytes).unwrap();
//!
//! assert_eq!(received.call(&[Datum::from(41)]).unwrap(), Datum::from(42));
//! ```
pub mod backtrace;
pub mod compiler;
mod datum;
mod error;
mod func;
mod gmr;
mod ident;
mod repr;
mod scope;
pub mod script;
pub mod term;
mod transform;
mod wire_func;

pub use backtrace::Backtrace;
pub use bincode::error::{DecodeError, EncodeError};
pub use datum::Datum;
pub use error::{CompileError, Error, EvalError};
pub use func::{Func, ScriptFunc, TermFunc, compile, compile_with};
pub use gmr::GroupMapReduce;
pub use ident::Ident;
pub use repr::{FuncRepr, ScriptRepr, TermRepr};
pub use scope::{Binding, CompileEnv, VarScope};
pub use term::{Builtin, Term};
pub use transform::{Transform, apply_transforms};
pub use wire_func::WireFunc;

use bincode::config::{Configuration, Fixint, LittleEndian, Limit};

pub type Shared<T> = std::sync::Arc<T>;

/// Largest message a decoder accepts.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Deepest nesting of terms and data a decoder accepts.
pub const MAX_DECODE_DEPTH: u32 = 256;

/// Encoding used for everything this crate puts on the wire.
pub const WIRE_CONFIG: Configuration<LittleEndian, Fixint, Limit<MAX_MESSAGE_SIZE>> = bincode::config::standard()
    .with_little_endian()
    .with_fixed_int_encoding()
    .with_limit::<MAX_MESSAGE_SIZE>();
