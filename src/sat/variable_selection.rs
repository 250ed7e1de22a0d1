#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Decision variable selection.
//!
//! [`Vsids`] keeps an activity score per variable, bumped for every variable
//! met during conflict analysis, with an increment that grows geometrically
//! so that older bumps decay. The unassigned variable with the highest
//! activity is picked next, ties going to the lowest variable id.
//! [`FixedOrder`] always picks the lowest unassigned variable.

use crate::sat::assignment::Assignment;
use crate::sat::literal::Variable;
use clap::ValueEnum;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::{Debug, Display};

pub trait VariableSelection: Debug + Clone {
    /// `seed == 0` gives every variable the same starting activity; other
    /// seeds add a small deterministic jitter.
    fn new(num_vars: usize, seed: u64) -> Self;

    fn pick(&mut self, assignment: &Assignment) -> Option<Variable>;

    fn bumps<T: IntoIterator<Item = Variable>>(&mut self, vars: T);

    fn decay(&mut self);

    /// Called for every variable leaving the assignment on backtrack.
    fn on_unassign(&mut self, var: Variable);
}

const VAR_DECAY: f64 = 0.95;
const RESCALE_LIMIT: f64 = 1e100;
const JITTER: f64 = 1e-5;

#[derive(Debug, Clone)]
pub struct Vsids {
    activity: Vec<f64>,
    increment: f64,
    heap: BinaryHeap<(OrderedFloat<f64>, Reverse<Variable>)>,
}

impl Vsids {
    #[must_use]
    pub fn activity(&self, var: Variable) -> f64 {
        self.activity[var as usize]
    }

    fn entry(&self, var: Variable) -> (OrderedFloat<f64>, Reverse<Variable>) {
        (OrderedFloat(self.activity[var as usize]), Reverse(var))
    }

    fn rebuild_heap<F: Fn(Variable) -> bool>(&mut self, keep: F) {
        let entries: Vec<_> = (0..self.activity.len())
            .filter_map(|i| Variable::try_from(i).ok())
            .filter(|&v| keep(v))
            .map(|v| self.entry(v))
            .collect();
        self.heap = BinaryHeap::from(entries);
    }

    fn bump(&mut self, var: Variable) {
        self.activity[var as usize] += self.increment;
        if self.activity[var as usize] > RESCALE_LIMIT {
            for a in &mut self.activity {
                *a *= 1.0 / RESCALE_LIMIT;
            }
            self.increment *= 1.0 / RESCALE_LIMIT;
            self.rebuild_heap(|_| true);
        } else {
            let entry = self.entry(var);
            self.heap.push(entry);
        }
    }
}

impl VariableSelection for Vsids {
    fn new(num_vars: usize, seed: u64) -> Self {
        let activity = if seed == 0 {
            vec![0.0; num_vars]
        } else {
            let mut rng = fastrand::Rng::with_seed(seed);
            (0..num_vars).map(|_| rng.f64() * JITTER).collect()
        };
        let mut vsids = Self {
            activity,
            increment: 1.0,
            heap: BinaryHeap::with_capacity(num_vars),
        };
        vsids.rebuild_heap(|_| true);
        vsids
    }

    fn pick(&mut self, assignment: &Assignment) -> Option<Variable> {
        if self.heap.len() > 4 * self.activity.len() + 64 {
            self.rebuild_heap(|v| !assignment.is_assigned(v));
        }
        while let Some((act, Reverse(var))) = self.heap.pop() {
            if assignment.is_assigned(var) || act.0 != self.activity[var as usize] {
                continue;
            }
            return Some(var);
        }
        None
    }

    fn bumps<T: IntoIterator<Item = Variable>>(&mut self, vars: T) {
        for var in vars {
            self.bump(var);
        }
    }

    fn decay(&mut self) {
        self.increment /= VAR_DECAY;
    }

    fn on_unassign(&mut self, var: Variable) {
        let entry = self.entry(var);
        self.heap.push(entry);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FixedOrder {
    num_vars: usize,
    next: usize,
}

impl VariableSelection for FixedOrder {
    fn new(num_vars: usize, _seed: u64) -> Self {
        Self { num_vars, next: 0 }
    }

    fn pick(&mut self, assignment: &Assignment) -> Option<Variable> {
        while self.next < self.num_vars {
            let var = Variable::try_from(self.next).ok()?;
            if !assignment.is_assigned(var) {
                return Some(var);
            }
            self.next += 1;
        }
        None
    }

    fn bumps<T: IntoIterator<Item = Variable>>(&mut self, _vars: T) {}

    fn decay(&mut self) {}

    fn on_unassign(&mut self, var: Variable) {
        self.next = self.next.min(var as usize);
    }
}

/// Run-time selectable variable selection.
#[derive(Debug, Clone)]
pub enum VariableSelectionImpls {
    Vsids(Vsids),
    FixedOrder(FixedOrder),
}

impl VariableSelection for VariableSelectionImpls {
    fn new(num_vars: usize, seed: u64) -> Self {
        Self::Vsids(Vsids::new(num_vars, seed))
    }

    fn pick(&mut self, assignment: &Assignment) -> Option<Variable> {
        match self {
            Self::Vsids(v) => v.pick(assignment),
            Self::FixedOrder(v) => v.pick(assignment),
        }
    }

    fn bumps<T: IntoIterator<Item = Variable>>(&mut self, vars: T) {
        match self {
            Self::Vsids(v) => v.bumps(vars),
            Self::FixedOrder(v) => v.bumps(vars),
        }
    }

    fn decay(&mut self) {
        match self {
            Self::Vsids(v) => v.decay(),
            Self::FixedOrder(v) => v.decay(),
        }
    }

    fn on_unassign(&mut self, var: Variable) {
        match self {
            Self::Vsids(v) => v.on_unassign(var),
            Self::FixedOrder(v) => v.on_unassign(var),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum VariableSelectionType {
    #[default]
    Vsids,
    FixedOrder,
}

impl Display for VariableSelectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vsids => write!(f, "vsids"),
            Self::FixedOrder => write!(f, "fixed-order"),
        }
    }
}

impl VariableSelectionType {
    #[must_use]
    pub fn to_impl(self, num_vars: usize, seed: u64) -> VariableSelectionImpls {
        match self {
            Self::Vsids => VariableSelectionImpls::Vsids(Vsids::new(num_vars, seed)),
            Self::FixedOrder => VariableSelectionImpls::FixedOrder(FixedOrder::new(num_vars, seed)),
        }
    }
}
