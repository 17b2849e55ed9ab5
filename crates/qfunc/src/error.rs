use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::{DecodeError, EncodeError, Ident, term::Arity};

type FunctionName = &'static str;
type ArgType = Vec<SmolStr>;

/// Faults detected while turning a representation into a compiled function.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Variable \"{0}\" is not defined")]
    UnresolvedSymbol(Ident),
    #[error("Parameter \"{0}\" is declared more than once")]
    DuplicateParameter(Ident),
    #[error("Invalid number of arguments in \"{name}\", expected {expected}, got {got}")]
    InvalidNumberOfArguments {
        name: FunctionName,
        expected: Arity,
        got: usize,
    },
    #[error("\"{0}\" is only available in scripts")]
    UnsupportedTerm(FunctionName),
}

/// Faults raised while a compiled function runs against actual data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(r#"Invalid types for "{}", got {}"#, name, args.join(", "))]
    InvalidTypes { name: FunctionName, args: ArgType },
    #[error("Divided by 0")]
    ZeroDivision,
    #[error("Index out of bounds {index}, length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("No attribute \"{0}\"")]
    NoSuchField(String),
    #[error("Function expects {expected} argument(s), got {got}")]
    InvalidNumberOfArguments { expected: usize, got: usize },
    #[error("Undefined variable \"{0}\"")]
    UndefinedVariable(String),
    #[error("Maximum nesting depth exceeded \"{0}\"")]
    RecursionError(u32),
    #[error("Unable to parse script at {line}:{column} near \"{near}\"")]
    ScriptParse { line: u32, column: usize, near: String },
    #[error("Script timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl EvalError {
    pub(crate) fn invalid_types(name: FunctionName, args: &[crate::Datum]) -> Self {
        EvalError::InvalidTypes {
            name,
            args: args.iter().map(|a| a.type_tag()).collect(),
        }
    }
}

/// Any fault surfaced by this crate.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("Malformed function bytes: {0}")]
    #[diagnostic(code(qfunc::decode))]
    Decode(#[from] DecodeError),
    #[error("Unable to write function: {0}")]
    #[diagnostic(code(qfunc::encode))]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    #[diagnostic(code(qfunc::compile))]
    Compile(#[from] CompileError),
    #[error(transparent)]
    #[diagnostic(code(qfunc::eval))]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Datum;

    #[test]
    fn test_invalid_types_message() {
        let err = EvalError::invalid_types("add", &[Datum::from(1), Datum::Null]);
        assert_eq!(err.to_string(), r#"Invalid types for "add", got number, null"#);
    }

    #[test]
    fn test_compile_error_message() {
        let err = CompileError::InvalidNumberOfArguments {
            name: "nth",
            expected: Arity::Exact(2),
            got: 1,
        };
        assert_eq!(err.to_string(), r#"Invalid number of arguments in "nth", expected 2, got 1"#);
        assert_eq!(
            CompileError::UnresolvedSymbol(Ident::new("y")).to_string(),
            r#"Variable "y" is not defined"#
        );
        assert_eq!(
            CompileError::UnsupportedTerm("while").to_string(),
            r#""while" is only available in scripts"#
        );
    }

    #[test]
    fn test_error_diagnostic_code() {
        let err = Error::from(EvalError::Timeout { timeout_ms: 10 });
        assert_eq!(err.code().map(|c| c.to_string()), Some("qfunc::eval".to_string()));
        assert_eq!(err.to_string(), "Script timed out after 10ms");
    }
}
