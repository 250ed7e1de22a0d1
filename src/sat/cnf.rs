#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Formulas in conjunctive normal form.
//!
//! A `Cnf` owns the original clauses followed by an append-only learned
//! section starting at `non_learnt_idx`. Original clause ids are their
//! positions, which is what learned clause premises and unsatisfiable cores
//! refer to.

use crate::sat::assignment::Model;
use crate::sat::clause::Clause;
use crate::sat::literal::{Literal, Variable};
use core::ops::{Index, IndexMut};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cnf {
    pub clauses: Vec<Clause>,
    pub num_vars: usize,
    pub non_learnt_idx: usize,
}

impl Cnf {
    /// Builds a formula from DIMACS-style integer clauses.
    pub fn new<I, J>(clauses: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = i32>,
    {
        let mut cnf = Self::default();
        for clause in clauses {
            cnf.add_clause(clause.into_iter().map(Literal::from_i32));
        }
        cnf
    }

    /// An empty formula over `num_vars` variables.
    #[must_use]
    pub const fn with_vars(num_vars: usize) -> Self {
        Self {
            clauses: Vec::new(),
            num_vars,
            non_learnt_idx: 0,
        }
    }

    /// Allocates a fresh variable.
    pub fn new_var(&mut self) -> Variable {
        let var = Variable::try_from(self.num_vars).unwrap_or(Variable::MAX);
        self.num_vars += 1;
        var
    }

    /// Appends an original clause and returns its id. Variables beyond
    /// `num_vars` grow the formula.
    ///
    /// # Panics
    ///
    /// If called after learned clauses have been added.
    pub fn add_clause<I: IntoIterator<Item = Literal>>(&mut self, literals: I) -> u32 {
        assert_eq!(
            self.non_learnt_idx,
            self.clauses.len(),
            "original clauses must precede learned clauses"
        );
        let id = u32::try_from(self.clauses.len()).unwrap_or(u32::MAX);
        let clause = Clause::original(literals, id);
        if let Some(max) = clause.iter().map(|l| l.variable() as usize).max() {
            self.num_vars = self.num_vars.max(max + 1);
        }
        self.clauses.push(clause);
        self.non_learnt_idx = self.clauses.len();
        id
    }

    /// Appends a learned clause and returns its index.
    pub fn add_learned(&mut self, clause: Clause) -> usize {
        self.clauses.push(clause);
        self.clauses.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    #[must_use]
    pub fn originals(&self) -> &[Clause] {
        &self.clauses[..self.non_learnt_idx]
    }

    #[must_use]
    pub fn num_learned(&self) -> usize {
        self.clauses.len() - self.non_learnt_idx
    }

    /// Total number of literals over the original clauses.
    #[must_use]
    pub fn num_literals(&self) -> usize {
        self.originals().iter().map(Clause::len).sum()
    }

    /// Id of the first original clause `model` falsifies.
    #[must_use]
    pub fn first_violated(&self, model: &Model) -> Option<usize> {
        self.originals()
            .iter()
            .position(|c| !c.iter().any(|&l| model.literal_value(l)))
    }

    /// True if `model` satisfies every original clause.
    #[must_use]
    pub fn verify(&self, model: &Model) -> bool {
        model.len() >= self.num_vars && self.first_violated(model).is_none()
    }

    /// A formula made of the original clauses listed in `ids`, renumbered in
    /// the given order.
    #[must_use]
    pub fn subset(&self, ids: &[u32]) -> Self {
        let mut cnf = Self::with_vars(self.num_vars);
        for &id in ids {
            cnf.add_clause(self.clauses[id as usize].iter().copied());
        }
        cnf
    }

    /// Drops every learned clause.
    pub fn clear_learned(&mut self) {
        self.clauses.truncate(self.non_learnt_idx);
    }
}

impl Index<usize> for Cnf {
    type Output = Clause;

    fn index(&self, index: usize) -> &Self::Output {
        &self.clauses[index]
    }
}

impl IndexMut<usize> for Cnf {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.clauses[index]
    }
}

impl Display for Cnf {
    /// Writes the original clauses in DIMACS format.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.non_learnt_idx)?;
        for clause in self.originals() {
            writeln!(f, "{} 0", clause.iter().join(" "))?;
        }
        Ok(())
    }
}
