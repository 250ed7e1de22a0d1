#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Strategies for managing the learned part of the clause database.
//!
//! Every conflict adds a learned clause, so without maintenance the database
//! grows without bound and propagation slows down. Management strategies:
//! - track clause activity (bumped when a clause takes part in a conflict),
//! - periodically drop the learned clauses least likely to help again.
//!
//! `LbdClauseManagement` reduces once the learned section reaches a
//! threshold that grows after each reduction. Clauses with LBD at most 2 are
//! always kept, original clauses are never touched, and clauses currently
//! acting as trail reasons are locked. `NoClauseManagement` keeps everything.

use crate::sat::cnf::Cnf;
use crate::sat::propagation::WatchedLiterals;
use crate::sat::trail::Trail;
use clap::ValueEnum;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::fmt::{Debug, Display};

const CLAUSE_DECAY: f64 = 0.999;
const ACTIVITY_LIMIT: f64 = 1e20;
/// Learned clauses with an LBD at or below this value are never removed.
pub const GLUE_LBD: u32 = 2;

/// When reductions happen: after `first` learned clauses, then every time the
/// learned section grows past a threshold raised by `increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionSchedule {
    pub first: usize,
    pub increment: usize,
}

impl Default for ReductionSchedule {
    fn default() -> Self {
        Self {
            first: 2000,
            increment: 300,
        }
    }
}

/// Interface for clause database management strategies.
pub trait ClauseManagement: Clone + Debug {
    fn new(schedule: ReductionSchedule) -> Self;

    /// Called once per conflict, after the learned clause was added.
    fn on_conflict(&mut self, cnf: &mut Cnf);

    /// Whether the database is due for a reduction.
    fn should_clean_db(&self, cnf: &Cnf) -> bool;

    /// Removes learned clauses and compacts the database. Reason indices on
    /// the trail are remapped and watches rebuilt.
    fn clean_clause_db(&mut self, cnf: &mut Cnf, trail: &mut Trail, watches: &mut WatchedLiterals);

    /// Bumps the activity of a clause that took part in conflict analysis.
    fn bump_involved_clause_activities(&mut self, cnf: &mut Cnf, c_ref: usize);

    /// Total number of clauses removed so far.
    fn num_removed(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LbdClauseManagement {
    threshold: usize,
    increment: usize,
    clause_inc: f64,
    num_removed: usize,

    /// Removal candidates: (index, lbd, activity).
    candidates: Vec<(usize, u32, f64)>,
    indices_to_remove: FxHashSet<usize>,
    old_to_new_idx_map: FxHashMap<usize, usize>,
}

impl LbdClauseManagement {
    fn rescale(&mut self, cnf: &mut Cnf) {
        for clause in &mut cnf.clauses[cnf.non_learnt_idx..] {
            clause.scale_activity(1.0 / ACTIVITY_LIMIT);
        }
        self.clause_inc *= 1.0 / ACTIVITY_LIMIT;
    }

    /// Orders removal candidates worst first: higher LBD, then lower
    /// activity, then newer.
    fn worst_first(a: &(usize, u32, f64), b: &(usize, u32, f64)) -> Ordering {
        b.1.cmp(&a.1)
            .then_with(|| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
            .then_with(|| b.0.cmp(&a.0))
    }
}

impl ClauseManagement for LbdClauseManagement {
    fn new(schedule: ReductionSchedule) -> Self {
        Self {
            threshold: schedule.first,
            increment: schedule.increment,
            clause_inc: 1.0,
            num_removed: 0,
            candidates: Vec::new(),
            indices_to_remove: FxHashSet::default(),
            old_to_new_idx_map: FxHashMap::default(),
        }
    }

    fn on_conflict(&mut self, cnf: &mut Cnf) {
        self.clause_inc /= CLAUSE_DECAY;
        if self.clause_inc > ACTIVITY_LIMIT {
            self.rescale(cnf);
        }
    }

    fn should_clean_db(&self, cnf: &Cnf) -> bool {
        cnf.num_learned() >= self.threshold
    }

    fn clean_clause_db(&mut self, cnf: &mut Cnf, trail: &mut Trail, watches: &mut WatchedLiterals) {
        self.threshold = self.threshold.saturating_add(self.increment);

        let learnt_start_idx = cnf.non_learnt_idx;
        let locked_clauses = trail.get_locked_clauses();

        self.candidates.clear();
        let mut num_unlocked = 0;
        for idx in learnt_start_idx..cnf.len() {
            if locked_clauses.contains(&idx) {
                continue;
            }
            num_unlocked += 1;
            let clause = &cnf[idx];
            if clause.lbd > GLUE_LBD {
                self.candidates.push((idx, clause.lbd, clause.activity()));
            }
        }

        let num_to_remove = (num_unlocked / 2).min(self.candidates.len());
        if num_to_remove == 0 {
            return;
        }

        self.candidates.sort_unstable_by(Self::worst_first);
        self.indices_to_remove.clear();
        self.indices_to_remove
            .extend(self.candidates.iter().take(num_to_remove).map(|c| c.0));

        self.old_to_new_idx_map.clear();
        let learned = cnf.clauses.split_off(learnt_start_idx);
        for (offset, clause) in learned.into_iter().enumerate() {
            let old_idx = learnt_start_idx + offset;
            if !self.indices_to_remove.contains(&old_idx) {
                self.old_to_new_idx_map.insert(old_idx, cnf.clauses.len());
                cnf.clauses.push(clause);
            }
        }

        trail.remap_clause_indices(&self.old_to_new_idx_map);
        watches.rebuild(cnf);

        self.num_removed += num_to_remove;
        log::trace!(
            "reduced learned clauses: removed {num_to_remove}, kept {}",
            cnf.num_learned()
        );
    }

    fn bump_involved_clause_activities(&mut self, cnf: &mut Cnf, c_ref: usize) {
        if !cnf[c_ref].is_learned() {
            return;
        }
        cnf[c_ref].bump_activity(self.clause_inc);
        if cnf[c_ref].activity() > ACTIVITY_LIMIT {
            self.rescale(cnf);
        }
    }

    fn num_removed(&self) -> usize {
        self.num_removed
    }
}

/// Keeps every learned clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Copy)]
pub struct NoClauseManagement;

impl ClauseManagement for NoClauseManagement {
    fn new(_schedule: ReductionSchedule) -> Self {
        Self
    }

    fn on_conflict(&mut self, _cnf: &mut Cnf) {}

    fn should_clean_db(&self, _cnf: &Cnf) -> bool {
        false
    }

    fn clean_clause_db(&mut self, _cnf: &mut Cnf, _trail: &mut Trail, _watches: &mut WatchedLiterals) {}

    fn bump_involved_clause_activities(&mut self, _cnf: &mut Cnf, _c_ref: usize) {}

    fn num_removed(&self) -> usize {
        0
    }
}

/// Possible clause management implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseManagementImpls {
    NoClauseManagement(NoClauseManagement),
    LbdActivityClauseManagement(LbdClauseManagement),
}

impl ClauseManagement for ClauseManagementImpls {
    fn new(schedule: ReductionSchedule) -> Self {
        Self::LbdActivityClauseManagement(LbdClauseManagement::new(schedule))
    }

    fn on_conflict(&mut self, cnf: &mut Cnf) {
        match self {
            Self::LbdActivityClauseManagement(m) => m.on_conflict(cnf),
            Self::NoClauseManagement(m) => m.on_conflict(cnf),
        }
    }

    fn should_clean_db(&self, cnf: &Cnf) -> bool {
        match self {
            Self::LbdActivityClauseManagement(m) => m.should_clean_db(cnf),
            Self::NoClauseManagement(m) => m.should_clean_db(cnf),
        }
    }

    fn clean_clause_db(&mut self, cnf: &mut Cnf, trail: &mut Trail, watches: &mut WatchedLiterals) {
        match self {
            Self::LbdActivityClauseManagement(m) => m.clean_clause_db(cnf, trail, watches),
            Self::NoClauseManagement(m) => m.clean_clause_db(cnf, trail, watches),
        }
    }

    fn bump_involved_clause_activities(&mut self, cnf: &mut Cnf, c_ref: usize) {
        match self {
            Self::LbdActivityClauseManagement(m) => m.bump_involved_clause_activities(cnf, c_ref),
            Self::NoClauseManagement(m) => m.bump_involved_clause_activities(cnf, c_ref),
        }
    }

    fn num_removed(&self) -> usize {
        match self {
            Self::LbdActivityClauseManagement(m) => m.num_removed(),
            Self::NoClauseManagement(m) => m.num_removed(),
        }
    }
}

/// Clause management strategy names accepted on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Default, ValueEnum)]
pub enum ClauseManagementType {
    NoClauseManagement,
    #[default]
    LbdActivityClauseManagement,
}

impl Display for ClauseManagementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoClauseManagement => write!(f, "no-clause-management"),
            Self::LbdActivityClauseManagement => write!(f, "lbd-activity-clause-management"),
        }
    }
}

impl ClauseManagementType {
    #[must_use]
    pub fn to_impl(self, schedule: ReductionSchedule) -> ClauseManagementImpls {
        match self {
            Self::NoClauseManagement => {
                ClauseManagementImpls::NoClauseManagement(NoClauseManagement::new(schedule))
            }
            Self::LbdActivityClauseManagement => {
                ClauseManagementImpls::LbdActivityClauseManagement(LbdClauseManagement::new(schedule))
            }
        }
    }
}
