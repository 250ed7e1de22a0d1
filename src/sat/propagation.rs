#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Unit propagation over two watched literals.
//!
//! Every clause of length two or more watches its first two literals. The
//! watch list of a literal holds the clauses watching it, each entry with a
//! blocker literal from the same clause: when the blocker is already true
//! the clause is skipped without being touched.

use crate::sat::assignment::Assignment;
use crate::sat::clause::Clause;
use crate::sat::cnf::Cnf;
use crate::sat::literal::Literal;
use crate::sat::trail::{Reason, Trail};
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watcher {
    pub cref: usize,
    pub blocker: Literal,
}

type WatchList = SmallVec<[Watcher; 6]>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchedLiterals {
    watches: Vec<WatchList>,
    num_propagations: usize,
}

impl WatchedLiterals {
    #[must_use]
    pub fn new(num_vars: usize) -> Self {
        Self {
            watches: vec![WatchList::new(); num_vars * 2],
            num_propagations: 0,
        }
    }

    /// Watches positions 0 and 1 of a clause. Unit and empty clauses are
    /// never watched.
    pub fn add_clause(&mut self, clause: &Clause, cref: usize) {
        if clause.len() < 2 {
            return;
        }
        let (a, b) = (clause[0], clause[1]);
        debug_assert_ne!(a, b);
        self[a].push(Watcher { cref, blocker: b });
        self[b].push(Watcher { cref, blocker: a });
    }

    /// Drops every watch and rewatches all clauses of `cnf` except
    /// tautologies. Used after the clause database has been compacted.
    pub fn rebuild(&mut self, cnf: &Cnf) {
        for list in &mut self.watches {
            list.clear();
        }
        for (cref, clause) in cnf.iter().enumerate() {
            if !clause.is_tautology() {
                self.add_clause(clause, cref);
            }
        }
    }

    #[must_use]
    pub const fn num_propagations(&self) -> usize {
        self.num_propagations
    }

    /// Propagates every pending trail literal to fixpoint. Implied literals
    /// are assigned and pushed on the trail at its current level.
    ///
    /// Returns the index of a falsified clause on conflict.
    pub fn propagate(
        &mut self,
        cnf: &mut Cnf,
        trail: &mut Trail,
        assignment: &mut Assignment,
    ) -> Option<usize> {
        while trail.curr_idx < trail.len() {
            let false_lit = trail[trail.curr_idx].lit.negated();
            trail.curr_idx += 1;
            self.num_propagations += 1;

            let mut ws = std::mem::take(&mut self.watches[false_lit.index()]);
            let mut conflict = None;
            let (mut i, mut j) = (0, 0);

            while i < ws.len() {
                let w = ws[i];
                i += 1;

                if assignment.literal_value(w.blocker) == Some(true) {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                let clause = &mut cnf.clauses[w.cref];
                if clause[0] == false_lit {
                    clause.swap(0, 1);
                }
                let first = clause[0];
                let kept = Watcher {
                    cref: w.cref,
                    blocker: first,
                };

                if first != w.blocker && assignment.literal_value(first) == Some(true) {
                    ws[j] = kept;
                    j += 1;
                    continue;
                }

                if let Some(k) =
                    (2..clause.len()).find(|&k| assignment.literal_value(clause[k]) != Some(false))
                {
                    clause.swap(1, k);
                    let new_watch = clause[1];
                    self.watches[new_watch.index()].push(kept);
                    continue;
                }

                ws[j] = kept;
                j += 1;

                if assignment.literal_value(first) == Some(false) {
                    conflict = Some(w.cref);
                    trail.curr_idx = trail.len();
                    while i < ws.len() {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    assignment.assign(first);
                    trail.push(first, Reason::Clause(w.cref));
                }
            }

            ws.truncate(j);
            self.watches[false_lit.index()] = ws;

            if conflict.is_some() {
                return conflict;
            }
        }

        None
    }
}

impl Index<Literal> for WatchedLiterals {
    type Output = WatchList;

    fn index(&self, index: Literal) -> &Self::Output {
        &self.watches[index.index()]
    }
}

impl IndexMut<Literal> for WatchedLiterals {
    fn index_mut(&mut self, index: Literal) -> &mut Self::Output {
        &mut self.watches[index.index()]
    }
}
