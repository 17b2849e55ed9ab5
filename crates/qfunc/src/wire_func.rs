use std::io::{Read, Write};

use bincode::{
    Decode, Encode,
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
};

use crate::{
    Backtrace, Datum, Error, Ident, Shared, Term, WIRE_CONFIG,
    error::{CompileError, EvalError},
    func::{self, Func},
    repr::{FuncRepr, TermRepr},
    script::Options,
};

/// A user function that can cross a process boundary.
///
/// Holds the representation it ships on the wire together with the function
/// compiled from it. Compilation happens once, when the value is built or
/// decoded; clones share the compiled function.
#[derive(Debug, Clone)]
pub struct WireFunc {
    repr: FuncRepr,
    func: Shared<Func>,
}

impl WireFunc {
    pub fn from_repr(repr: FuncRepr) -> Result<Self, CompileError> {
        Self::from_repr_with(repr, &Options::default())
    }

    /// Like [`WireFunc::from_repr`], with `options` applied to a script body.
    pub fn from_repr_with(repr: FuncRepr, options: &Options) -> Result<Self, CompileError> {
        let func = func::compile_with(&repr, options)?;
        tracing::debug!(kind = repr.kind(), "built wire function");
        Ok(Self { repr, func })
    }

    /// Builds a wire function from one that is already compiled.
    ///
    /// The representation is extracted from `func` and compiled again, so the
    /// result owns its own compiled form.
    pub fn from_func(func: &Shared<Func>) -> Result<Self, CompileError> {
        Self::from_repr(func.to_repr())
    }

    /// Builds a wire function from a term body with nothing captured.
    pub fn from_body(
        body: Shared<Term>,
        arg_names: Vec<Ident>,
        backtrace: Shared<Backtrace>,
    ) -> Result<Self, CompileError> {
        Self::from_repr(FuncRepr::Term(TermRepr::new(body, arg_names, backtrace)))
    }

    #[inline(always)]
    pub fn compiled(&self) -> &Shared<Func> {
        &self.func
    }

    pub fn backtrace(&self) -> &Shared<Backtrace> {
        self.func.backtrace()
    }

    pub fn repr(&self) -> &FuncRepr {
        &self.repr
    }

    pub fn call(&self, args: &[Datum]) -> Result<Datum, EvalError> {
        self.func.call(args)
    }

    /// Replaces this value with a copy of `other`.
    pub fn assign(&mut self, other: &WireFunc) {
        self.clone_from(other);
    }

    pub fn serialize<W: Write>(&self, sink: &mut W) -> Result<usize, Error> {
        Ok(bincode::encode_into_std_write(self, sink, WIRE_CONFIG)?)
    }

    /// Reads a function from `source` and installs it in place of the current
    /// one. On failure `self` is left as it was.
    pub fn deserialize<R: Read>(&mut self, source: &mut R) -> Result<(), Error> {
        *self = Self::decode_from(source)?;
        Ok(())
    }

    pub fn decode_from<R: Read>(source: &mut R) -> Result<Self, Error> {
        let repr: FuncRepr = bincode::decode_from_std_read(source, WIRE_CONFIG)?;
        tracing::debug!(kind = repr.kind(), "decoded wire function");
        Ok(Self::from_repr(repr)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(bincode::encode_to_vec(self, WIRE_CONFIG)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (repr, _): (FuncRepr, usize) = bincode::decode_from_slice(bytes, WIRE_CONFIG)?;
        Ok(Self::from_repr(repr)?)
    }
}

impl PartialEq for WireFunc {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Encode for WireFunc {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.repr.encode(encoder)
    }
}

// Used when a wire function is nested in a larger message; a compile fault
// aborts the enclosing decode.
impl<Context> Decode<Context> for WireFunc {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let repr = FuncRepr::decode(decoder)?;
        WireFunc::from_repr(repr).map_err(|e| DecodeError::OtherString(e.to_string()))
    }
}

bincode::impl_borrow_decode!(WireFunc);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backtrace::Frame, repr::ScriptRepr, term::Builtin};
    use rstest::{fixture, rstest};

    #[fixture]
    fn double() -> WireFunc {
        WireFunc::from_body(
            Shared::new(Term::call(Builtin::Mul, vec![Term::var("n"), Term::datum(2)])),
            vec![Ident::new("n")],
            Shared::new(Backtrace::new(vec![Frame::Pos(0)])),
        )
        .unwrap()
    }

    #[rstest]
    fn test_clone_shares_compiled(double: WireFunc) {
        let copy = double.clone();
        assert!(Shared::ptr_eq(double.compiled(), copy.compiled()));
        assert_eq!(copy.repr(), double.repr());
    }

    #[rstest]
    fn test_assign_replaces_both_parts(double: WireFunc) {
        let mut target = WireFunc::from_repr(ScriptRepr::new("null", Shared::new(Backtrace::empty())).into()).unwrap();
        target.assign(&double);

        assert!(Shared::ptr_eq(target.compiled(), double.compiled()));
        assert_eq!(target.call(&[Datum::from(4)]), Ok(Datum::from(8)));
    }

    #[rstest]
    fn test_bytes_round_trip(double: WireFunc) {
        let bytes = double.to_bytes().unwrap();
        let decoded = WireFunc::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, double);
        assert_eq!(decoded.backtrace().as_ref(), double.backtrace().as_ref());
        assert!(!Shared::ptr_eq(decoded.compiled(), double.compiled()));
        assert_eq!(decoded.call(&[Datum::from(21)]), Ok(Datum::from(42)));
    }

    #[rstest]
    fn test_deserialize_overwrites_populated_target(double: WireFunc) {
        let script = WireFunc::from_repr(ScriptRepr::new("fn(s): s + \"!\"", Shared::new(Backtrace::empty())).into())
            .unwrap();
        let mut bytes = Vec::new();
        script.serialize(&mut bytes).unwrap();

        let mut target = double;
        target.deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(target, script);
        assert_eq!(target.call(&[Datum::from("hi")]), Ok(Datum::from("hi!")));
    }

    #[rstest]
    fn test_compile_fault_during_deserialize_propagates(double: WireFunc) {
        let broken = FuncRepr::Term(TermRepr::new(
            Shared::new(Term::var("ghost")),
            vec![],
            Shared::new(Backtrace::empty()),
        ));
        let bytes = bincode::encode_to_vec(&broken, WIRE_CONFIG).unwrap();

        let mut target = double.clone();
        let err = target.deserialize(&mut bytes.as_slice()).unwrap_err();

        assert!(matches!(err, Error::Compile(CompileError::UnresolvedSymbol(_))));
        assert_eq!(target, double);
    }

    #[rstest]
    fn test_from_func_extracts_representation(double: WireFunc) {
        let rebuilt = WireFunc::from_func(double.compiled()).unwrap();

        assert_eq!(rebuilt, double);
        assert!(!Shared::ptr_eq(rebuilt.compiled(), double.compiled()));
    }
}
