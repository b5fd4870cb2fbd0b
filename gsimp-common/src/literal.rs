//! Variable and literal representations
//!
//! A literal is encoded as `2 * variable + sign`, so both polarities of a
//! variable are adjacent and the negation is a single bit flip. Variables
//! start at 1; literal ids 0 and 1 are never used by a formula.

use crate::memory::Offset;
use static_assertions::const_assert;
use std::{fmt, mem::size_of, ops};

/// A boolean variable, starting at 1.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default)]
pub struct Variable(pub u32);

/// A variable with a polarity.
///
/// This is `repr(transparent)` so that literal payloads stored in word
/// buffers can be viewed as `&[Literal]` without copying.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Literal {
    pub encoding: u32,
}

const_assert!(size_of::<Literal>() == size_of::<u32>());

impl Variable {
    /// The positive literal of this variable.
    pub fn literal(self) -> Literal {
        Literal::from_raw(self.0 * 2)
    }
    /// Iterate over variables `1..=max_var`.
    pub fn range(max_var: Variable) -> impl Iterator<Item = Variable> {
        (1..=max_var.0).map(Variable)
    }
}

impl Offset for Variable {
    fn as_offset(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of literal ids needed for variables up to `max_var`.
pub fn literal_array_len(max_var: Variable) -> usize {
    2 * (max_var.as_offset() + 1)
}

impl Literal {
    /// Construct a new literal from the usual signed representation.
    pub fn new(value: i32) -> Literal {
        Literal {
            encoding: value.unsigned_abs() * 2 + ((value < 0) as u32),
        }
    }
    /// Wrap a raw encoding.
    pub const fn from_raw(encoding: u32) -> Literal {
        Literal { encoding }
    }
    /// The usual signed representation.
    pub fn decode(self) -> i32 {
        let magnitude = self.var().0 as i32;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
    pub fn var(self) -> Variable {
        Variable(self.encoding >> 1)
    }
    pub fn is_negative(self) -> bool {
        self.encoding & 1 != 0
    }
}

impl Offset for Literal {
    fn as_offset(&self) -> usize {
        self.encoding as usize
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}

impl ops::Neg for Literal {
    type Output = Literal;
    fn neg(self) -> Literal {
        Literal {
            encoding: self.encoding ^ 1,
        }
    }
}

/// View raw literal words as literals.
pub fn as_literals(words: &[u32]) -> &[Literal] {
    // Literal is repr(transparent) over u32.
    unsafe { std::slice::from_raw_parts(words.as_ptr() as *const Literal, words.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding() {
        assert_eq!(Literal::new(1).encoding, 2);
        assert_eq!(Literal::new(-1).encoding, 3);
        assert_eq!(-Literal::new(7), Literal::new(-7));
        assert_eq!(Literal::new(-7).var(), Variable(7));
        assert_eq!(Literal::new(-7).decode(), -7);
        assert_eq!(Variable(3).literal(), Literal::new(3));
        assert_eq!(literal_array_len(Variable(3)), 8);
    }

    #[test]
    fn literal_view() {
        let words = [4u32, 5];
        assert_eq!(as_literals(&words), &[Literal::new(2), Literal::new(-2)]);
    }
}
