#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Partial assignments used during search, and total models returned on SAT.

use crate::sat::literal::{Literal, Variable};
use core::ops::Index;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Copy, Default, Hash, PartialOrd, Ord)]
pub enum VarState {
    #[default]
    Unassigned,
    Assigned(bool),
}

impl VarState {
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        !self.is_assigned()
    }

    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::Assigned(true))
    }

    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::Assigned(false))
    }
}

/// Current value of every variable. Kept in lockstep with the trail.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    states: Vec<VarState>,
    assigned: usize,
}

impl Index<Variable> for Assignment {
    type Output = VarState;

    fn index(&self, index: Variable) -> &Self::Output {
        &self.states[index as usize]
    }
}

impl Assignment {
    #[must_use]
    pub fn new(num_vars: usize) -> Self {
        Self {
            states: vec![VarState::Unassigned; num_vars],
            assigned: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Makes `lit` true.
    pub fn assign(&mut self, lit: Literal) {
        let state = &mut self.states[lit.variable() as usize];
        if state.is_unassigned() {
            self.assigned += 1;
        }
        *state = VarState::Assigned(lit.polarity());
    }

    pub fn unassign(&mut self, var: Variable) {
        let state = &mut self.states[var as usize];
        if state.is_assigned() {
            self.assigned -= 1;
        }
        *state = VarState::Unassigned;
    }

    #[must_use]
    pub fn var_value(&self, var: Variable) -> Option<bool> {
        match self.states.get(var as usize) {
            Some(VarState::Assigned(b)) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn literal_value(&self, lit: Literal) -> Option<bool> {
        self.var_value(lit.variable()).map(|b| b == lit.polarity())
    }

    #[must_use]
    pub fn is_assigned(&self, var: Variable) -> bool {
        self.states[var as usize].is_assigned()
    }

    #[must_use]
    pub const fn num_assigned(&self) -> usize {
        self.assigned
    }

    #[must_use]
    pub fn all_assigned(&self) -> bool {
        self.assigned == self.states.len()
    }

    /// Freezes a complete assignment into a model. Unassigned variables read
    /// as false.
    #[must_use]
    pub fn to_model(&self) -> Model {
        Model(self.states.iter().map(|s| s.is_true()).collect())
    }
}

/// A total assignment satisfying a formula.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Model(Vec<bool>);

impl Model {
    #[must_use]
    pub const fn new(values: Vec<bool>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn value(&self, var: Variable) -> bool {
        self.0.get(var as usize).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn literal_value(&self, lit: Literal) -> bool {
        self.value(lit.variable()) == lit.polarity()
    }

    /// Variables assigned true, in increasing order.
    pub fn true_vars(&self) -> impl Iterator<Item = Variable> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .filter_map(|(i, _)| Variable::try_from(i).ok())
    }

    #[must_use]
    pub fn values(&self) -> &[bool] {
        &self.0
    }
}

impl Display for Model {
    /// DIMACS style: every variable as a signed integer.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (i, &b) in self.0.iter().enumerate() {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            let var = i + 1;
            if b {
                write!(f, "{var}")?;
            } else {
                write!(f, "-{var}")?;
            }
        }
        Ok(())
    }
}
