//! Per-row transforms shipped along with a query.

use bincode::{
    Decode, Encode,
    de::Decoder,
    enc::Encoder,
    error::{AllowedEnumVariants, DecodeError, EncodeError},
};

use crate::{Datum, error::EvalError, wire_func::WireFunc};

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Replaces each row with `f(row)`.
    Map(WireFunc),
    /// Keeps the rows for which `f(row)` is truthy. When `f` fails and a
    /// default is given, the default decides instead.
    Filter { func: WireFunc, default: Option<Datum> },
    /// `f(row)` yields an array whose elements replace the row.
    ConcatMap(WireFunc),
}

impl Transform {
    pub fn func(&self) -> &WireFunc {
        match self {
            Transform::Map(func) | Transform::ConcatMap(func) => func,
            Transform::Filter { func, .. } => func,
        }
    }

    fn apply_one(&self, row: Datum, out: &mut Vec<Datum>) -> Result<(), EvalError> {
        match self {
            Transform::Map(func) => out.push(func.call(&[row])?),
            Transform::Filter { func, default } => {
                let keep = match (func.call(std::slice::from_ref(&row)), default) {
                    (Ok(value), _) => value.is_truthy(),
                    (Err(err), Some(default)) => {
                        tracing::trace!(error = %err, "filter fell back to its default");
                        default.is_truthy()
                    }
                    (Err(err), None) => return Err(err),
                };
                if keep {
                    out.push(row);
                }
            }
            Transform::ConcatMap(func) => match func.call(&[row])? {
                Datum::Array(items) => out.extend(items),
                other => return Err(EvalError::invalid_types("concat_map", &[other])),
            },
        }
        Ok(())
    }
}

/// Runs `rows` through `transforms` in order.
pub fn apply_transforms<I>(transforms: &[Transform], rows: I) -> Result<Vec<Datum>, EvalError>
where
    I: IntoIterator<Item = Datum>,
{
    let mut rows = rows.into_iter().collect::<Vec<_>>();

    for transform in transforms {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            transform.apply_one(row, &mut out)?;
        }
        rows = out;
    }

    Ok(rows)
}

impl Encode for Transform {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        match self {
            Transform::Map(func) => {
                0u8.encode(encoder)?;
                func.encode(encoder)
            }
            Transform::Filter { func, default } => {
                1u8.encode(encoder)?;
                func.encode(encoder)?;
                default.encode(encoder)
            }
            Transform::ConcatMap(func) => {
                2u8.encode(encoder)?;
                func.encode(encoder)
            }
        }
    }
}

impl<Context> Decode<Context> for Transform {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        match u8::decode(decoder)? {
            0 => WireFunc::decode(decoder).map(Transform::Map),
            1 => {
                let func = WireFunc::decode(decoder)?;
                let default = Option::<Datum>::decode(decoder)?;
                Ok(Transform::Filter { func, default })
            }
            2 => WireFunc::decode(decoder).map(Transform::ConcatMap),
            found => Err(DecodeError::UnexpectedVariant {
                type_name: "Transform",
                allowed: &AllowedEnumVariants::Range { min: 0, max: 2 },
                found: found as u32,
            }),
        }
    }
}
