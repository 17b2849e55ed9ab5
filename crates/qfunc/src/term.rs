//! Expression terms: the body of an interpreted function.
//!
//! Terms are built by the query front end (or by the script parser) and are
//! never mutated once they are captured by a function, so they are shared
//! behind [`Shared`](crate::Shared) handles.

pub mod builtin;

use bincode::{
    Decode, Encode,
    de::Decoder,
    error::{AllowedEnumVariants, DecodeError},
};

use crate::{Datum, Ident, MAX_DECODE_DEPTH, datum::nested_too_deep};

pub use builtin::{Arity, Builtin};

/// A term is decoded with a depth count: a body nested deeper than
/// [`MAX_DECODE_DEPTH`](crate::MAX_DECODE_DEPTH), data included, is rejected.
#[derive(Debug, Clone, PartialEq, Encode)]
pub enum Term {
    Datum(Datum),
    Var(Ident),
    MakeArray(Vec<Term>),
    Call(Builtin, Vec<Term>),
    /// `Branch(cond, then, else)`
    Branch(Box<Term>, Box<Term>, Box<Term>),
    /// `Let(name, value, body)` binds `name` while evaluating `body`.
    Let(Ident, Box<Term>, Box<Term>),
    /// `While(cond, body)` evaluates `body` while `cond` is truthy and yields null.
    /// Only scripts run loops; the term compiler rejects them.
    While(Box<Term>, Box<Term>),
}

impl Term {
    pub fn datum(value: impl Into<Datum>) -> Self {
        Term::Datum(value.into())
    }

    pub fn var(name: &str) -> Self {
        Term::Var(Ident::new(name))
    }

    pub fn call(op: Builtin, args: Vec<Term>) -> Self {
        Term::Call(op, args)
    }

    pub fn branch(cond: Term, then: Term, otherwise: Term) -> Self {
        Term::Branch(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn let_(name: &str, value: Term, body: Term) -> Self {
        Term::Let(Ident::new(name), Box::new(value), Box::new(body))
    }

    pub fn while_(cond: Term, body: Term) -> Self {
        Term::While(Box::new(cond), Box::new(body))
    }
}

impl Term {
    fn decode_nested<D: Decoder>(decoder: &mut D, depth: u32) -> Result<Self, DecodeError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(nested_too_deep("term"));
        }

        let next = depth + 1;

        match u32::decode(decoder)? {
            0 => Datum::decode_nested(decoder, next).map(Term::Datum),
            1 => Ident::decode(decoder).map(Term::Var),
            2 => Self::decode_list(decoder, next).map(Term::MakeArray),
            3 => {
                let op = Builtin::decode(decoder)?;
                let args = Self::decode_list(decoder, next)?;
                Ok(Term::Call(op, args))
            }
            4 => {
                let cond = Self::decode_boxed(decoder, next)?;
                let then = Self::decode_boxed(decoder, next)?;
                let otherwise = Self::decode_boxed(decoder, next)?;
                Ok(Term::Branch(cond, then, otherwise))
            }
            5 => {
                let ident = Ident::decode(decoder)?;
                let value = Self::decode_boxed(decoder, next)?;
                let body = Self::decode_boxed(decoder, next)?;
                Ok(Term::Let(ident, value, body))
            }
            6 => {
                let cond = Self::decode_boxed(decoder, next)?;
                let body = Self::decode_boxed(decoder, next)?;
                Ok(Term::While(cond, body))
            }
            found => Err(DecodeError::UnexpectedVariant {
                type_name: "Term",
                allowed: &AllowedEnumVariants::Range { min: 0, max: 6 },
                found,
            }),
        }
    }

    fn decode_boxed<D: Decoder>(decoder: &mut D, depth: u32) -> Result<Box<Self>, DecodeError> {
        Self::decode_nested(decoder, depth).map(Box::new)
    }

    fn decode_list<D: Decoder>(decoder: &mut D, depth: u32) -> Result<Vec<Self>, DecodeError> {
        let len = u64::decode(decoder)? as usize;
        let mut terms = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            terms.push(Self::decode_nested(decoder, depth)?);
        }
        Ok(terms)
    }
}

impl<Context> Decode<Context> for Term {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Self::decode_nested(decoder, 0)
    }
}

bincode::impl_borrow_decode!(Term);
