use std::fmt::{self, Display, Formatter};

use bincode::{Decode, Encode};

use crate::{Datum, error::EvalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,
    And,
    Or,
    Nth,
    Field,
    Len,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exact(expected) => *expected == n,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
        }
    }
}

const BUILTINS: [Builtin; 19] = [
    Builtin::Add,
    Builtin::Sub,
    Builtin::Mul,
    Builtin::Div,
    Builtin::Mod,
    Builtin::Neg,
    Builtin::Eq,
    Builtin::Ne,
    Builtin::Lt,
    Builtin::Le,
    Builtin::Gt,
    Builtin::Ge,
    Builtin::Not,
    Builtin::And,
    Builtin::Or,
    Builtin::Nth,
    Builtin::Field,
    Builtin::Len,
    Builtin::Contains,
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Div => "div",
            Builtin::Mod => "mod",
            Builtin::Neg => "neg",
            Builtin::Eq => "eq",
            Builtin::Ne => "ne",
            Builtin::Lt => "lt",
            Builtin::Le => "le",
            Builtin::Gt => "gt",
            Builtin::Ge => "ge",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Nth => "nth",
            Builtin::Field => "field",
            Builtin::Len => "len",
            Builtin::Contains => "contains",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS.iter().copied().find(|b| b.name() == name)
    }

    pub fn arity(self) -> Arity {
        match self {
            Builtin::Neg | Builtin::Not | Builtin::Len => Arity::Exact(1),
            _ => Arity::Exact(2),
        }
    }

    /// `and` and `or` only evaluate their second operand when needed.
    #[inline(always)]
    pub fn is_short_circuit(self) -> bool {
        matches!(self, Builtin::And | Builtin::Or)
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Applies `op` to already evaluated arguments.
///
/// Callers check the arity up front, so `args.len()` always matches
/// [`Builtin::arity`].
pub fn apply(op: Builtin, args: Vec<Datum>) -> Result<Datum, EvalError> {
    let name = op.name();
    match (op, args.as_slice()) {
        (Builtin::Add, [Datum::Number(a), Datum::Number(b)]) => Ok(Datum::Number(a + b)),
        (Builtin::Add, [Datum::String(a), Datum::String(b)]) => Ok(Datum::String(format!("{}{}", a, b))),
        (Builtin::Add, [Datum::Array(a), Datum::Array(b)]) => {
            Ok(Datum::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Builtin::Sub, [Datum::Number(a), Datum::Number(b)]) => Ok(Datum::Number(a - b)),
        (Builtin::Mul, [Datum::Number(a), Datum::Number(b)]) => Ok(Datum::Number(a * b)),
        (Builtin::Div | Builtin::Mod, [Datum::Number(_), Datum::Number(b)]) if *b == 0.0 => {
            Err(EvalError::ZeroDivision)
        }
        (Builtin::Div, [Datum::Number(a), Datum::Number(b)]) => Ok(Datum::Number(a / b)),
        (Builtin::Mod, [Datum::Number(a), Datum::Number(b)]) => Ok(Datum::Number(a % b)),
        (Builtin::Neg, [Datum::Number(a)]) => Ok(Datum::Number(-a)),
        (Builtin::Eq, [a, b]) => Ok(Datum::Bool(a == b)),
        (Builtin::Ne, [a, b]) => Ok(Datum::Bool(a != b)),
        (Builtin::Lt | Builtin::Le | Builtin::Gt | Builtin::Ge, [a, b]) => compare(op, a, b),
        (Builtin::Not, [a]) => Ok(Datum::Bool(!a.is_truthy())),
        (Builtin::And, [a, b]) => Ok(if a.is_truthy() { b.clone() } else { a.clone() }),
        (Builtin::Or, [a, b]) => Ok(if a.is_truthy() { a.clone() } else { b.clone() }),
        (Builtin::Nth, [Datum::Array(items), Datum::Number(index)]) if index.fract() == 0.0 => {
            nth(items, *index as i64)
        }
        (Builtin::Field, [Datum::Object(fields), Datum::String(key)]) => fields
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::NoSuchField(key.clone())),
        (Builtin::Len, [Datum::String(s)]) => Ok(Datum::Number(s.chars().count() as f64)),
        (Builtin::Len, [Datum::Array(items)]) => Ok(Datum::Number(items.len() as f64)),
        (Builtin::Len, [Datum::Object(fields)]) => Ok(Datum::Number(fields.len() as f64)),
        (Builtin::Contains, [Datum::Array(items), needle]) => Ok(Datum::Bool(items.contains(needle))),
        (Builtin::Contains, [Datum::String(s), Datum::String(needle)]) => Ok(Datum::Bool(s.contains(needle.as_str()))),
        _ => Err(EvalError::invalid_types(name, &args)),
    }
}

fn compare(op: Builtin, a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    let ordering = match (a, b) {
        (Datum::Number(a), Datum::Number(b)) => a.partial_cmp(b),
        (Datum::String(a), Datum::String(b)) => Some(a.cmp(b)),
        _ => return Err(EvalError::invalid_types(op.name(), &[a.clone(), b.clone()])),
    };

    let Some(ordering) = ordering else {
        // NaN compares false to everything
        return Ok(Datum::FALSE);
    };

    Ok(Datum::Bool(match op {
        Builtin::Lt => ordering.is_lt(),
        Builtin::Le => ordering.is_le(),
        Builtin::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn nth(items: &[Datum], index: i64) -> Result<Datum, EvalError> {
    let len = items.len();
    let resolved = if index < 0 { len as i64 + index } else { index };

    if resolved < 0 || resolved as usize >= len {
        return Err(EvalError::IndexOutOfBounds { index, len });
    }

    Ok(items[resolved as usize].clone())
}
