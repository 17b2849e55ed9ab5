use bincode::{Decode, Encode};
use rustc_hash::FxHashMap;

use crate::{Datum, Error, Shared, WIRE_CONFIG, error::CompileError, func::Func, wire_func::WireFunc};

/// The three functions of a grouped aggregation.
///
/// `group` computes a row's key, `map` the value the row contributes and
/// `reduce` folds two values of the same group into one. The slots are
/// independent; nothing checks that they fit together.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct GroupMapReduce {
    group: WireFunc,
    map: WireFunc,
    reduce: WireFunc,
}

impl GroupMapReduce {
    pub fn new(group: &Shared<Func>, map: &Shared<Func>, reduce: &Shared<Func>) -> Result<Self, CompileError> {
        Ok(Self {
            group: WireFunc::from_func(group)?,
            map: WireFunc::from_func(map)?,
            reduce: WireFunc::from_func(reduce)?,
        })
    }

    pub fn from_wire_funcs(group: WireFunc, map: WireFunc, reduce: WireFunc) -> Self {
        Self { group, map, reduce }
    }

    pub fn group(&self) -> &WireFunc {
        &self.group
    }

    pub fn map(&self) -> &WireFunc {
        &self.map
    }

    pub fn reduce(&self) -> &WireFunc {
        &self.reduce
    }

    pub fn compiled_group(&self) -> &Shared<Func> {
        self.group.compiled()
    }

    pub fn compiled_map(&self) -> &Shared<Func> {
        self.map.compiled()
    }

    pub fn compiled_reduce(&self) -> &Shared<Func> {
        self.reduce.compiled()
    }

    /// Groups `rows` by key and folds each group's mapped values.
    ///
    /// Groups come out in the order their keys were first seen, each under its
    /// first key. Keys are compared by the wire encoding of their canonical
    /// form, so `0` and `-0` share a group and so do all NaNs.
    pub fn apply<I>(&self, rows: I) -> Result<Vec<(Datum, Datum)>, Error>
    where
        I: IntoIterator<Item = Datum>,
    {
        let mut index: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
        let mut groups: Vec<(Datum, Datum)> = Vec::new();

        for row in rows {
            let args = [row];
            let key = self.group.call(&args)?;
            let value = self.map.call(&args)?;
            let encoded = bincode::encode_to_vec(canonical_key(&key), WIRE_CONFIG)?;

            match index.get(&encoded) {
                Some(&i) => {
                    let acc = std::mem::take(&mut groups[i].1);
                    groups[i].1 = self.reduce.call(&[acc, value])?;
                }
                None => {
                    index.insert(encoded, groups.len());
                    groups.push((key, value));
                }
            }
        }

        Ok(groups)
    }
}

fn canonical_key(key: &Datum) -> Datum {
    match key {
        Datum::Number(n) if *n == 0.0 => Datum::Number(0.0),
        Datum::Number(n) if n.is_nan() => Datum::Number(f64::NAN),
        Datum::Array(items) => Datum::Array(items.iter().map(canonical_key).collect()),
        Datum::Object(fields) => Datum::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), canonical_key(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}
