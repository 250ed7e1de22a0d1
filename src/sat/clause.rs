#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Clauses as stored in a solver's clause database.

use crate::sat::literal::Literal;
use core::ops::{Index, IndexMut};
use itertools::Itertools;
use smallvec::SmallVec;

/// Inline literal storage. Most clauses produced by the package encoder are
/// binary, and learned clauses rarely exceed a handful of literals.
pub type ClauseLiterals = SmallVec<[Literal; 8]>;

/// Whether a clause belongs to the input formula or was derived by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClauseKind {
    #[default]
    Original,
    Learned,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clause {
    pub literals: ClauseLiterals,
    pub kind: ClauseKind,
    /// Literal blocks distance, set when the clause is learned.
    pub lbd: u32,
    activity: f64,
    /// Sorted ids of the original clauses this clause was derived from.
    /// An original clause lists only itself.
    pub premises: Vec<u32>,
}

impl Clause {
    /// Creates an original clause with id `id`. Repeated literals are dropped,
    /// keeping first occurrences in order.
    #[must_use]
    pub fn original<I: IntoIterator<Item = Literal>>(literals: I, id: u32) -> Self {
        Self {
            literals: literals.into_iter().unique().collect(),
            kind: ClauseKind::Original,
            lbd: 0,
            activity: 0.0,
            premises: vec![id],
        }
    }

    #[must_use]
    pub fn learned<I: IntoIterator<Item = Literal>>(literals: I, lbd: u32, premises: Vec<u32>) -> Self {
        Self {
            literals: literals.into_iter().collect(),
            kind: ClauseKind::Learned,
            lbd,
            activity: 0.0,
            premises,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }

    #[must_use]
    pub fn is_learned(&self) -> bool {
        self.kind == ClauseKind::Learned
    }

    /// True if the clause contains a literal and its negation.
    #[must_use]
    pub fn is_tautology(&self) -> bool {
        self.literals
            .iter()
            .any(|&l| self.literals.contains(&l.negated()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.literals.iter()
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        self.literals.swap(i, j);
    }

    #[must_use]
    pub const fn activity(&self) -> f64 {
        self.activity
    }

    pub fn bump_activity(&mut self, increment: f64) {
        self.activity += increment;
    }

    pub fn scale_activity(&mut self, factor: f64) {
        self.activity *= factor;
    }
}

impl Index<usize> for Clause {
    type Output = Literal;

    fn index(&self, index: usize) -> &Self::Output {
        &self.literals[index]
    }
}

impl IndexMut<usize> for Clause {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.literals[index]
    }
}

impl From<Vec<i32>> for Clause {
    fn from(literals: Vec<i32>) -> Self {
        Self::original(literals.into_iter().map(Literal::from_i32), 0)
    }
}
