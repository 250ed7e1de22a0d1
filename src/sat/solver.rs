#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Shared solver vocabulary: strategy configuration, budgets, cancellation,
//! outcomes and statistics.

use crate::sat::assignment::Model;
use crate::sat::clause_management::{
    ClauseManagement, ClauseManagementImpls, LbdClauseManagement, ReductionSchedule,
};
use crate::sat::cnf::Cnf;
use crate::sat::restarter::{DEFAULT_RESTART_UNIT, Luby, Restarter, RestarterImpls};
use crate::sat::variable_selection::{VariableSelection, VariableSelectionImpls, Vsids};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Bundles the strategies a CDCL solver is generic over.
pub trait SolverConfig: Debug + Clone {
    type VariableSelector: VariableSelection;
    type Restarter: Restarter;
    type ClauseManager: ClauseManagement;
}

/// VSIDS, Luby restarts and LBD-based clause reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultConfig;

impl SolverConfig for DefaultConfig {
    type VariableSelector = Vsids;
    type Restarter = Luby;
    type ClauseManager = LbdClauseManagement;
}

/// Strategies chosen at run time, e.g. from the command line or per
/// portfolio worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DynamicConfig;

impl SolverConfig for DynamicConfig {
    type VariableSelector = VariableSelectionImpls;
    type Restarter = RestarterImpls;
    type ClauseManager = ClauseManagementImpls;
}

/// Tunables of a single CDCL instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdclOptions {
    /// Diversification seed. `0` means no jitter and positive initial phases.
    pub seed: u64,
    /// Conflicts per restart unit.
    pub restart_unit: usize,
    pub reduction: ReductionSchedule,
    /// Learned clauses up to this length are published to portfolio peers.
    pub share_max_len: usize,
    /// Track which original clauses every learned clause derives from, so
    /// that refutations carry an unsatisfiable core.
    pub track_premises: bool,
}

impl Default for CdclOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            restart_unit: DEFAULT_RESTART_UNIT,
            reduction: ReductionSchedule::default(),
            share_max_len: 8,
            track_premises: true,
        }
    }
}

/// Resource limits for one solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budget {
    pub max_conflicts: Option<u64>,
    pub deadline: Option<Instant>,
}

impl Budget {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_conflicts: None,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn with_conflicts(mut self, max_conflicts: u64) -> Self {
        self.max_conflicts = Some(max_conflicts);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// The reason to stop after `conflicts` conflicts, if any.
    #[must_use]
    pub fn exhausted(&self, conflicts: u64) -> Option<TimeoutReason> {
        if self.max_conflicts.is_some_and(|max| conflicts >= max) {
            return Some(TimeoutReason::ConflictBudget);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(TimeoutReason::Deadline);
        }
        None
    }
}

/// Cooperative cancellation: raised when any of its flags is set.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flags: Vec<Arc<AtomicBool>>,
}

impl Interrupt {
    #[must_use]
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flags: vec![flag] }
    }

    /// Also listen to `flag`.
    #[must_use]
    pub fn and(mut self, flag: Arc<AtomicBool>) -> Self {
        self.flags.push(flag);
        self
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutReason {
    ConflictBudget,
    Deadline,
    Interrupted,
}

impl Display for TimeoutReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictBudget => write!(f, "conflict budget exhausted"),
            Self::Deadline => write!(f, "deadline reached"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Proof of unsatisfiability, reduced to the original clauses it uses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Refutation {
    /// Sorted ids of original clauses that are jointly unsatisfiable. Empty
    /// when premise tracking was off.
    pub core: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Sat(Model),
    Unsat(Refutation),
    /// Unknown: the budget ran out or the search was cancelled.
    Timeout(TimeoutReason),
}

impl SolveOutcome {
    /// SAT and UNSAT are conclusive; a timeout is not.
    #[must_use]
    pub const fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Timeout(_))
    }

    #[must_use]
    pub const fn model(&self) -> Option<&Model> {
        match self {
            Self::Sat(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolutionStats {
    pub conflicts: usize,
    pub decisions: usize,
    pub propagations: usize,
    pub restarts: usize,
    pub learnt_clauses: usize,
    pub removed_clauses: usize,
    pub exported_clauses: usize,
    pub imported_clauses: usize,
}

impl SolutionStats {
    /// Sums counters across portfolio workers.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            conflicts: self.conflicts + other.conflicts,
            decisions: self.decisions + other.decisions,
            propagations: self.propagations + other.propagations,
            restarts: self.restarts + other.restarts,
            learnt_clauses: self.learnt_clauses + other.learnt_clauses,
            removed_clauses: self.removed_clauses + other.removed_clauses,
            exported_clauses: self.exported_clauses + other.exported_clauses,
            imported_clauses: self.imported_clauses + other.imported_clauses,
        }
    }
}

pub trait Solver {
    fn new(cnf: Cnf) -> Self;

    fn solve(&mut self) -> SolveOutcome;

    fn stats(&self) -> SolutionStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_conflicts() {
        let budget = Budget::unlimited().with_conflicts(10);
        assert_eq!(budget.exhausted(9), None);
        assert_eq!(budget.exhausted(10), Some(TimeoutReason::ConflictBudget));
    }

    #[test]
    fn test_budget_deadline() {
        let budget = Budget::unlimited().with_timeout(Duration::ZERO);
        assert_eq!(budget.exhausted(0), Some(TimeoutReason::Deadline));
    }

    #[test]
    fn test_interrupt_any_flag() {
        let a = Arc::new(AtomicBool::new(false));
        let b = Arc::new(AtomicBool::new(false));
        let interrupt = Interrupt::new(a.clone()).and(b.clone());
        assert!(!interrupt.is_raised());
        b.store(true, Ordering::Relaxed);
        assert!(interrupt.is_raised());
        assert!(!Interrupt::default().is_raised());
    }

    #[test]
    fn test_stats_merge() {
        let a = SolutionStats {
            conflicts: 2,
            decisions: 3,
            ..SolutionStats::default()
        };
        let merged = a.merge(a);
        assert_eq!(merged.conflicts, 4);
        assert_eq!(merged.decisions, 6);
    }
}
