use bincode::{
    Decode, Encode,
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
};
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::{Datum, Ident, error::CompileError};

/// Snapshot of the variables visible where a function literal was written.
///
/// A scope is owned by the representation that captured it and copied along
/// with it; it never changes after capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarScope {
    vars: FxHashMap<Ident, Datum>,
}

impl VarScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this scope with `ident` bound to `value`.
    pub fn with_var(&self, ident: Ident, value: Datum) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(ident, value);
        Self { vars }
    }

    #[inline(always)]
    pub fn lookup(&self, ident: Ident) -> Option<&Datum> {
        self.vars.get(&ident)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables sorted by name; the order used on the wire.
    pub fn sorted_vars(&self) -> Vec<(String, &Datum)> {
        let mut vars = self
            .vars
            .iter()
            .map(|(ident, value)| (ident.as_str(), value))
            .collect::<Vec<_>>();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Builds the compile-time view of this scope with `arg_names` bound as
    /// formal parameters.
    pub fn compute_visibility<'a>(&'a self, arg_names: &[Ident]) -> Result<CompileEnv<'a>, CompileError> {
        CompileEnv::new(self).with_args(arg_names)
    }
}

impl FromIterator<(Ident, Datum)> for VarScope {
    fn from_iter<T: IntoIterator<Item = (Ident, Datum)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl Encode for VarScope {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        let vars = self.sorted_vars();
        (vars.len() as u64).encode(encoder)?;
        for (name, value) in vars {
            name.encode(encoder)?;
            value.encode(encoder)?;
        }
        Ok(())
    }
}

impl<Context> Decode<Context> for VarScope {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let len = u64::decode(decoder)? as usize;
        // the count comes off the wire, so it only bounds the reservation
        let mut vars = FxHashMap::with_capacity_and_hasher(len.min(1024), FxBuildHasher);
        for _ in 0..len {
            let ident = Ident::decode(decoder)?;
            let value = Datum::decode(decoder)?;
            vars.insert(ident, value);
        }
        Ok(Self { vars })
    }
}

/// Where a name resolves while compiling a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<'a> {
    /// Frame slot filled by a call argument or a `let`.
    Slot(usize),
    /// Value captured when the function was defined.
    Captured(&'a Datum),
}

/// Compile-time environment: the captured scope plus the slots of the
/// function frame.
///
/// Slots shadow captured variables, and later slots shadow earlier ones.
#[derive(Debug)]
pub struct CompileEnv<'a> {
    captured: &'a VarScope,
    slots: Vec<Ident>,
    visible: Vec<usize>,
    arity: usize,
}

impl<'a> CompileEnv<'a> {
    pub fn new(captured: &'a VarScope) -> Self {
        Self {
            captured,
            slots: Vec::new(),
            visible: Vec::new(),
            arity: 0,
        }
    }

    pub fn with_args(mut self, arg_names: &[Ident]) -> Result<Self, CompileError> {
        for (i, ident) in arg_names.iter().enumerate() {
            if arg_names[..i].contains(ident) {
                return Err(CompileError::DuplicateParameter(*ident));
            }
            self.push(*ident);
        }
        self.arity = arg_names.len();
        Ok(self)
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Total number of slots a frame needs to run the compiled body.
    pub fn frame_size(&self) -> usize {
        self.slots.len()
    }

    /// Allocates a fresh slot for `ident` and makes it visible.
    pub fn push(&mut self, ident: Ident) -> usize {
        let slot = self.slots.len();
        self.slots.push(ident);
        self.visible.push(slot);
        slot
    }

    /// Hides the most recently pushed binding; its slot stays allocated.
    pub fn pop(&mut self) {
        self.visible.pop();
    }

    pub fn resolve(&self, ident: Ident) -> Result<Binding<'a>, CompileError> {
        if let Some(slot) = self.visible.iter().rev().find(|slot| self.slots[**slot] == ident) {
            return Ok(Binding::Slot(*slot));
        }

        self.captured
            .lookup(ident)
            .map(Binding::Captured)
            .ok_or(CompileError::UnresolvedSymbol(ident))
    }
}
