#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The assignment trail: every assigned literal in assignment order, with
//! the decision level it was made at and the reason it holds.

use crate::sat::literal::{Literal, Variable};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub enum Reason {
    #[default]
    Decision,
    /// Implied by the clause at this index. The implied literal sits at
    /// position 0 of that clause.
    Clause(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    pub lit: Literal,
    pub decision_level: u32,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trail {
    steps: Vec<Step>,
    /// Propagation head: steps before it have been propagated.
    pub curr_idx: usize,
    var_to_level: Vec<u32>,
    var_to_pos: Vec<usize>,
    /// Trail length at the start of each decision level.
    trail_lim: Vec<usize>,
}

impl Index<usize> for Trail {
    type Output = Step;

    fn index(&self, index: usize) -> &Self::Output {
        &self.steps[index]
    }
}

impl Trail {
    #[must_use]
    pub fn new(num_vars: usize) -> Self {
        Self {
            steps: Vec::with_capacity(num_vars),
            curr_idx: 0,
            var_to_level: vec![0; num_vars],
            var_to_pos: vec![usize::MAX; num_vars],
            trail_lim: Vec::new(),
        }
    }

    #[must_use]
    pub fn decision_level(&self) -> u32 {
        u32::try_from(self.trail_lim.len()).unwrap_or(u32::MAX)
    }

    pub fn new_decision_level(&mut self) {
        self.trail_lim.push(self.steps.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Records `lit` at the current decision level.
    ///
    /// The caller keeps the assignment in sync.
    pub fn push(&mut self, lit: Literal, reason: Reason) {
        let var = lit.variable() as usize;
        debug_assert_eq!(self.var_to_pos[var], usize::MAX, "variable {var} already on the trail");
        self.var_to_level[var] = self.decision_level();
        self.var_to_pos[var] = self.steps.len();
        self.steps.push(Step {
            lit,
            decision_level: self.decision_level(),
            reason,
        });
    }

    /// Decision level of an assigned variable.
    #[must_use]
    pub fn level(&self, var: Variable) -> u32 {
        self.var_to_level[var as usize]
    }

    /// Reason of an assigned variable.
    #[must_use]
    pub fn reason(&self, var: Variable) -> Reason {
        self.steps[self.var_to_pos[var as usize]].reason
    }

    #[must_use]
    pub fn position(&self, var: Variable) -> Option<usize> {
        let pos = self.var_to_pos[var as usize];
        (pos != usize::MAX).then_some(pos)
    }

    /// Removes every step above `level`, newest first, handing each removed
    /// literal to `on_unassign`.
    pub fn backstep_to<F: FnMut(Literal)>(&mut self, level: u32, mut on_unassign: F) {
        let level = level as usize;
        if self.trail_lim.len() <= level {
            return;
        }
        let truncate_at = self.trail_lim[level];
        for step in self.steps.drain(truncate_at..).rev() {
            let var = step.lit.variable() as usize;
            self.var_to_pos[var] = usize::MAX;
            self.var_to_level[var] = 0;
            on_unassign(step.lit);
        }
        self.trail_lim.truncate(level);
        self.curr_idx = self.curr_idx.min(truncate_at);
    }

    /// Clause indices currently acting as reasons. These must survive
    /// clause database reductions.
    #[must_use]
    pub fn get_locked_clauses(&self) -> FxHashSet<usize> {
        self.steps
            .iter()
            .filter_map(|s| match s.reason {
                Reason::Clause(c) => Some(c),
                Reason::Decision => None,
            })
            .collect()
    }

    /// Rewrites clause reasons after the clause database was compacted.
    pub fn remap_clause_indices(&mut self, map: &FxHashMap<usize, usize>) {
        for step in &mut self.steps {
            if let Reason::Clause(c) = step.reason {
                if let Some(&new) = map.get(&c) {
                    step.reason = Reason::Clause(new);
                }
            }
        }
    }
}
