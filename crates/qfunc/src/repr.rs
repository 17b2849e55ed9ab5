//! Wire-transmissible descriptions of user functions.

use bincode::{
    Decode, Encode,
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
};

use crate::{Backtrace, Ident, Shared, Term, VarScope};

const TERM_TAG: u8 = 0;
const SCRIPT_TAG: u8 = 1;

/// An interpreted function: a term body closed over the variables visible
/// where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRepr {
    pub captured_scope: VarScope,
    pub arg_names: Vec<Ident>,
    pub body: Shared<Term>,
    pub backtrace: Shared<Backtrace>,
}

impl TermRepr {
    pub fn new(body: Shared<Term>, arg_names: Vec<Ident>, backtrace: Shared<Backtrace>) -> Self {
        Self {
            captured_scope: VarScope::new(),
            arg_names,
            body,
            backtrace,
        }
    }

    pub fn with_scope(mut self, captured_scope: VarScope) -> Self {
        self.captured_scope = captured_scope;
        self
    }

    pub fn arity(&self) -> usize {
        self.arg_names.len()
    }
}

// Fields are written bare; the variant tag belongs to `FuncRepr`.
impl Encode for TermRepr {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.captured_scope.encode(encoder)?;
        self.arg_names.encode(encoder)?;
        self.body.as_ref().encode(encoder)?;
        self.backtrace.as_ref().encode(encoder)
    }
}

impl<Context> Decode<Context> for TermRepr {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let captured_scope = VarScope::decode(decoder)?;
        let arg_names = Vec::<Ident>::decode(decoder)?;
        let body = Term::decode(decoder)?;
        let backtrace = Backtrace::decode(decoder)?;

        Ok(Self {
            captured_scope,
            arg_names,
            body: Shared::new(body),
            backtrace: Shared::new(backtrace),
        })
    }
}

/// A function handed to the script engine as source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRepr {
    pub source: String,
    pub timeout_ms: u64,
    pub backtrace: Shared<Backtrace>,
}

impl ScriptRepr {
    pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

    pub fn new(source: impl Into<String>, backtrace: Shared<Backtrace>) -> Self {
        Self {
            source: source.into(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            backtrace,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Encode for ScriptRepr {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.source.encode(encoder)?;
        self.timeout_ms.encode(encoder)?;
        self.backtrace.as_ref().encode(encoder)
    }
}

impl<Context> Decode<Context> for ScriptRepr {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let source = String::decode(decoder)?;
        let timeout_ms = u64::decode(decoder)?;
        let backtrace = Backtrace::decode(decoder)?;

        Ok(Self {
            source,
            timeout_ms,
            backtrace: Shared::new(backtrace),
        })
    }
}

/// Exactly one of the function shapes a query can ship.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncRepr {
    Term(TermRepr),
    Script(ScriptRepr),
}

impl FuncRepr {
    pub fn backtrace(&self) -> &Shared<Backtrace> {
        match self {
            FuncRepr::Term(repr) => &repr.backtrace,
            FuncRepr::Script(repr) => &repr.backtrace,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FuncRepr::Term(_) => "term",
            FuncRepr::Script(_) => "script",
        }
    }
}

impl From<TermRepr> for FuncRepr {
    fn from(repr: TermRepr) -> Self {
        FuncRepr::Term(repr)
    }
}

impl From<ScriptRepr> for FuncRepr {
    fn from(repr: ScriptRepr) -> Self {
        FuncRepr::Script(repr)
    }
}

impl Encode for FuncRepr {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        match self {
            FuncRepr::Term(repr) => {
                TERM_TAG.encode(encoder)?;
                repr.encode(encoder)
            }
            FuncRepr::Script(repr) => {
                SCRIPT_TAG.encode(encoder)?;
                repr.encode(encoder)
            }
        }
    }
}

impl<Context> Decode<Context> for FuncRepr {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        match u8::decode(decoder)? {
            TERM_TAG => TermRepr::decode(decoder).map(FuncRepr::Term),
            SCRIPT_TAG => ScriptRepr::decode(decoder).map(FuncRepr::Script),
            found => Err(DecodeError::UnexpectedVariant {
                type_name: "FuncRepr",
                allowed: &bincode::error::AllowedEnumVariants::Range { min: 0, max: 1 },
                found: found as u32,
            }),
        }
    }
}
