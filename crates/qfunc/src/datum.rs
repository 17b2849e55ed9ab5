use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use bincode::{
    Decode, Encode,
    de::Decoder,
    error::{AllowedEnumVariants, DecodeError},
};
use itertools::Itertools;
use smol_str::SmolStr;

use crate::MAX_DECODE_DEPTH;

/// A value flowing into and out of a function: a row, a field, a group key.
///
/// Decoding fails once arrays and objects nest deeper than
/// [`MAX_DECODE_DEPTH`](crate::MAX_DECODE_DEPTH).
#[derive(Debug, Clone, PartialEq, Default, Encode)]
pub enum Datum {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Datum>),
    Object(BTreeMap<String, Datum>),
}

impl Datum {
    pub const TRUE: Datum = Datum::Bool(true);
    pub const FALSE: Datum = Datum::Bool(false);

    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Datum::Null | Datum::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "bool",
            Datum::Number(_) => "number",
            Datum::String(_) => "string",
            Datum::Array(_) => "array",
            Datum::Object(_) => "object",
        }
    }

    /// Short description used in type errors, e.g. `number`, `array`.
    pub(crate) fn type_tag(&self) -> SmolStr {
        SmolStr::new_static(self.type_name())
    }
}

pub(crate) fn nested_too_deep(what: &str) -> DecodeError {
    DecodeError::OtherString(format!("{} nested deeper than {} levels", what, MAX_DECODE_DEPTH))
}

impl Datum {
    /// Decodes a datum found `depth` levels below the top of the payload.
    pub(crate) fn decode_nested<D: Decoder>(decoder: &mut D, depth: u32) -> Result<Self, DecodeError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(nested_too_deep("datum"));
        }

        match u32::decode(decoder)? {
            0 => Ok(Datum::Null),
            1 => bool::decode(decoder).map(Datum::Bool),
            2 => f64::decode(decoder).map(Datum::Number),
            3 => String::decode(decoder).map(Datum::String),
            4 => {
                let len = u64::decode(decoder)? as usize;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(Self::decode_nested(decoder, depth + 1)?);
                }
                Ok(Datum::Array(items))
            }
            5 => {
                let len = u64::decode(decoder)? as usize;
                let mut fields = BTreeMap::new();
                for _ in 0..len {
                    let key = String::decode(decoder)?;
                    let value = Self::decode_nested(decoder, depth + 1)?;
                    fields.insert(key, value);
                }
                Ok(Datum::Object(fields))
            }
            found => Err(DecodeError::UnexpectedVariant {
                type_name: "Datum",
                allowed: &AllowedEnumVariants::Range { min: 0, max: 5 },
                found,
            }),
        }
    }
}

impl<Context> Decode<Context> for Datum {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Self::decode_nested(decoder, 0)
    }
}

bincode::impl_borrow_decode!(Datum);

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Datum::Number(n) => write!(f, "{}", n),
            Datum::String(s) => write!(f, "{:?}", s),
            Datum::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
            Datum::Object(fields) => write!(
                f,
                "{{{}}}",
                fields.iter().map(|(k, v)| format!("{:?}: {}", k, v)).join(", ")
            ),
        }
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<f64> for Datum {
    fn from(n: f64) -> Self {
        Datum::Number(n)
    }
}

impl From<i32> for Datum {
    fn from(n: i32) -> Self {
        Datum::Number(n as f64)
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Datum::Number(n as f64)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(items: Vec<Datum>) -> Self {
        Datum::Array(items)
    }
}

impl From<serde_json::Value> for Datum {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Datum::Null,
            serde_json::Value::Bool(b) => Datum::Bool(b),
            serde_json::Value::Number(n) => Datum::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Datum::String(s),
            serde_json::Value::Array(items) => Datum::Array(items.into_iter().map(Datum::from).collect()),
            serde_json::Value::Object(fields) => {
                Datum::Object(fields.into_iter().map(|(k, v)| (k, Datum::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WIRE_CONFIG;
    use rstest::rstest;
    use serde_json::json;

    /// Wire bytes of `[[[...null...]]]` with `depth` arrays.
    fn nested_arrays(depth: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(depth * 12 + 4);
        for _ in 0..depth {
            bytes.extend_from_slice(&4u32.to_le_bytes());
            bytes.extend_from_slice(&1u64.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    #[rstest]
    #[case::null(Datum::Null, false)]
    #[case::false_(Datum::FALSE, false)]
    #[case::true_(Datum::TRUE, true)]
    #[case::zero(Datum::Number(0.0), true)]
    #[case::empty_string(Datum::from(""), true)]
    #[case::empty_array(Datum::Array(vec![]), true)]
    fn test_is_truthy(#[case] datum: Datum, #[case] expected: bool) {
        assert_eq!(datum.is_truthy(), expected);
    }

    #[rstest]
    #[case::integer(Datum::Number(42.0), "42")]
    #[case::fraction(Datum::Number(1.5), "1.5")]
    #[case::string(Datum::from("a\"b"), "\"a\\\"b\"")]
    #[case::array(Datum::from(vec![Datum::from(1), Datum::Null]), "[1, null]")]
    fn test_display(#[case] datum: Datum, #[case] expected: &str) {
        assert_eq!(datum.to_string(), expected);
    }

    #[test]
    fn test_from_json() {
        let datum = Datum::from(json!({"name": "ada", "tags": [1, true, null]}));
        let Datum::Object(fields) = &datum else {
            panic!("expected object, got {}", datum);
        };
        assert_eq!(fields["name"], Datum::from("ada"));
        assert_eq!(
            fields["tags"],
            Datum::from(vec![Datum::from(1), Datum::TRUE, Datum::Null])
        );
        assert_eq!(datum.to_string(), r#"{"name": "ada", "tags": [1, true, null]}"#);
    }

    #[test]
    fn test_decode_matches_encoding() {
        let datum = Datum::from(json!({"k": [1.5, "s", null, {"b": false}], "e": {}}));
        let bytes = bincode::encode_to_vec(&datum, WIRE_CONFIG).unwrap();
        let (decoded, read): (Datum, usize) = bincode::decode_from_slice(&bytes, WIRE_CONFIG).unwrap();

        assert_eq!(decoded, datum);
        assert_eq!(read, bytes.len());
    }

    #[rstest]
    #[case::at_limit(MAX_DECODE_DEPTH as usize, true)]
    #[case::past_limit(MAX_DECODE_DEPTH as usize + 1, false)]
    #[case::far_past_limit(200_000, false)]
    fn test_decode_nesting_limit(#[case] depth: usize, #[case] accepted: bool) {
        let result: Result<(Datum, usize), _> = bincode::decode_from_slice(&nested_arrays(depth), WIRE_CONFIG);

        match result {
            Ok(_) => assert!(accepted, "depth {} decoded", depth),
            Err(DecodeError::OtherString(message)) => {
                assert!(!accepted, "depth {} rejected: {}", depth, message);
                assert_eq!(message, "datum nested deeper than 256 levels");
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_decode_unknown_variant() {
        let result: Result<(Datum, usize), _> = bincode::decode_from_slice(&9u32.to_le_bytes(), WIRE_CONFIG);
        assert!(matches!(result, Err(DecodeError::UnexpectedVariant { found: 9, .. })));
    }
}
