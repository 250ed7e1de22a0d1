#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Variables and literals.
//!
//! Variables are dense zero-based indices. A literal packs its variable and
//! sign into one `u32` (`var << 1 | negated`), so a literal doubles as an
//! index into per-literal tables such as the watch lists.

use core::ops::{Neg, Not};
use std::fmt::{Display, Formatter};

/// A propositional variable.
pub type Variable = u32;

/// A variable together with a polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Literal(u32);

impl Literal {
    /// Creates a literal. `polarity == true` is the positive literal.
    #[must_use]
    pub const fn new(var: Variable, polarity: bool) -> Self {
        Self((var << 1) | ((!polarity) as u32))
    }

    /// The positive literal of `var`.
    #[must_use]
    pub const fn positive(var: Variable) -> Self {
        Self::new(var, true)
    }

    /// The negative literal of `var`.
    #[must_use]
    pub const fn negative(var: Variable) -> Self {
        Self::new(var, false)
    }

    #[must_use]
    pub const fn variable(self) -> Variable {
        self.0 >> 1
    }

    #[must_use]
    pub const fn polarity(self) -> bool {
        self.0 & 1 == 0
    }

    #[must_use]
    pub const fn is_negated(self) -> bool {
        !self.polarity()
    }

    #[must_use]
    pub const fn negated(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// Position of this literal in literal-indexed tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Converts a DIMACS literal (`3`, `-3`) into a literal on variable `2`.
    ///
    /// # Panics
    ///
    /// If `value` is zero, which DIMACS reserves as the clause terminator.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        assert_ne!(value, 0, "0 is not a DIMACS literal");
        Self::new(value.unsigned_abs() - 1, value.is_positive())
    }

    /// The DIMACS form of this literal.
    #[must_use]
    pub fn to_i32(self) -> i32 {
        let var = i32::try_from(self.variable()).unwrap_or(i32::MAX - 1) + 1;
        if self.polarity() { var } else { -var }
    }
}

impl Not for Literal {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl Neg for Literal {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Not for &Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_i32())
    }
}
