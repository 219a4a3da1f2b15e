// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host labels: a mark plus a list of atoms.

/// Visual mark attached to a node or edge label.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mark {
    /// Unmarked.
    #[default]
    None,
    /// Red mark.
    Red,
    /// Green mark.
    Green,
    /// Blue mark.
    Blue,
    /// Grey mark.
    Grey,
    /// Dashed mark (edges only by convention).
    Dashed,
}

/// A single label atom.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Atom {
    /// Integer atom.
    Int(i64),
    /// String atom. A character is a string of exactly one `char`.
    Str(String),
}

impl Atom {
    /// Returns the integer payload, if this atom is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Returns the string payload, if this atom is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(s) => Some(s),
        }
    }

    /// `true` for a string of exactly one character.
    #[must_use]
    pub fn is_char(&self) -> bool {
        self.as_str().is_some_and(|s| s.chars().count() == 1)
    }
}

impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Label of a host node or edge.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label {
    /// Mark component.
    pub mark: Mark,
    /// Atom list; empty for the blank label.
    pub atoms: Vec<Atom>,
}

impl Label {
    /// Blank, unmarked label.
    #[must_use]
    pub fn blank() -> Self {
        Self::default()
    }

    /// Unmarked label with the given atoms.
    pub fn of<I, A>(atoms: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Atom>,
    {
        Self {
            mark: Mark::None,
            atoms: atoms.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the label with its mark replaced.
    pub fn marked(mut self, mark: Mark) -> Self {
        self.mark = mark;
        self
    }
}
