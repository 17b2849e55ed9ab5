use std::fmt::{self, Display, Formatter};

use bincode::{Decode, Encode};
use itertools::Itertools;

/// One step from the root of a query towards the term that defined a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Frame {
    /// Positional argument index.
    Pos(u32),
    /// Named optional argument.
    Opt(String),
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Pos(i) => write!(f, "{}", i),
            Frame::Opt(name) => write!(f, "{:?}", name),
        }
    }
}

/// Diagnostic location of a function within the query that produced it.
///
/// Error messages raised while a function runs carry this so the user can be
/// pointed at the offending part of their query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Encode, Decode)]
pub struct Backtrace {
    frames: Vec<Frame>,
}

impl Backtrace {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns a new backtrace one frame deeper.
    pub fn with(&self, frame: Frame) -> Self {
        let mut frames = self.frames.clone();
        frames.push(frame);
        Self { frames }
    }
}

impl Display for Backtrace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.frames.iter().join(", "))
    }
}

impl FromIterator<Frame> for Backtrace {
    fn from_iter<T: IntoIterator<Item = Frame>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
