#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The Conflict-Driven Clause Learning solver.
//!
//! One instance owns one copy of the formula and searches single-threaded:
//! propagate to fixpoint, learn a first-UIP clause on conflict and backjump,
//! otherwise decide on the most active unassigned variable with its saved
//! phase. Restarts and learned clause reduction run on the schedules of the
//! configured strategies. When attached to a clause exchange, short learned
//! clauses are published and peer clauses are imported at restarts.

use crate::sat::assignment::{Assignment, Model};
use crate::sat::clause::{Clause, ClauseLiterals};
use crate::sat::clause_management::ClauseManagement;
use crate::sat::cnf::Cnf;
use crate::sat::conflict_analysis::{Analyser, Analysis, Conflict};
use crate::sat::exchange::{ExchangeEndpoint, SharedClause};
use crate::sat::literal::{Literal, Variable};
use crate::sat::phase_saving::SavedPhases;
use crate::sat::propagation::WatchedLiterals;
use crate::sat::restarter::Restarter;
use crate::sat::solver::{
    Budget, CdclOptions, DefaultConfig, Interrupt, Refutation, SolutionStats, SolveOutcome,
    Solver, SolverConfig, TimeoutReason,
};
use crate::sat::trail::{Reason, Trail};
use crate::sat::variable_selection::VariableSelection;
use itertools::Itertools;

#[derive(Debug, Clone)]
pub struct Cdcl<C: SolverConfig = DefaultConfig> {
    pub cnf: Cnf,
    pub assignment: Assignment,
    pub trail: Trail,
    watches: WatchedLiterals,
    pub selector: C::VariableSelector,
    pub restarter: C::Restarter,
    pub manager: C::ClauseManager,
    phases: SavedPhases,
    analyser: Analyser,
    options: CdclOptions,
    budget: Budget,
    interrupt: Interrupt,
    exchange: Option<ExchangeEndpoint>,
    stats: SolutionStats,
    initialised: bool,
    finished: Option<SolveOutcome>,
}

impl<C: SolverConfig> Cdcl<C> {
    /// Creates a solver with strategies built from `options`.
    #[must_use]
    pub fn with_options(cnf: Cnf, options: CdclOptions) -> Self {
        let selector = C::VariableSelector::new(cnf.num_vars, options.seed);
        let restarter = C::Restarter::new(options.restart_unit);
        let manager = C::ClauseManager::new(options.reduction);
        Self::from_parts(cnf, options, selector, restarter, manager)
    }

    /// Creates a solver from explicitly constructed strategies.
    #[must_use]
    pub fn from_parts(
        cnf: Cnf,
        options: CdclOptions,
        selector: C::VariableSelector,
        restarter: C::Restarter,
        manager: C::ClauseManager,
    ) -> Self {
        let num_vars = cnf.num_vars;
        Self {
            assignment: Assignment::new(num_vars),
            trail: Trail::new(num_vars),
            watches: WatchedLiterals::new(num_vars),
            phases: SavedPhases::new(num_vars, options.seed),
            analyser: Analyser::new(num_vars, options.track_premises),
            cnf,
            selector,
            restarter,
            manager,
            options,
            budget: Budget::unlimited(),
            interrupt: Interrupt::default(),
            exchange: None,
            stats: SolutionStats::default(),
            initialised: false,
            finished: None,
        }
    }

    #[must_use]
    pub const fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub fn with_exchange(mut self, endpoint: ExchangeEndpoint) -> Self {
        self.exchange = Some(endpoint);
        self
    }

    /// Replaces the budget, e.g. to resume after a timeout.
    pub const fn set_budget(&mut self, budget: Budget) {
        self.budget = budget;
    }

    #[must_use]
    pub const fn options(&self) -> &CdclOptions {
        &self.options
    }

    /// Number of clauses currently in the learned section.
    #[must_use]
    pub fn num_learned(&self) -> usize {
        self.cnf.num_learned()
    }

    fn enqueue(&mut self, lit: Literal, reason: Reason) {
        self.assignment.assign(lit);
        self.trail.push(lit, reason);
    }

    fn backtrack(&mut self, level: u32) {
        let Self {
            trail,
            assignment,
            phases,
            selector,
            ..
        } = self;
        trail.backstep_to(level, |lit| {
            assignment.unassign(lit.variable());
            phases.save(lit);
            selector.on_unassign(lit.variable());
        });
    }

    fn decide(&mut self, var: Variable) {
        let phase = self.phases.get(var);
        self.trail.new_decision_level();
        self.enqueue(Literal::new(var, phase), Reason::Decision);
        self.stats.decisions += 1;
    }

    /// Watches the original clauses and enqueues original units. Detects
    /// empty clauses and contradicting units.
    fn initialise(&mut self) -> Option<Refutation> {
        if self.initialised {
            return None;
        }
        self.initialised = true;

        for idx in 0..self.cnf.non_learnt_idx {
            let clause = &self.cnf[idx];
            if clause.is_empty() {
                return Some(Refutation {
                    core: clause.premises.clone(),
                });
            }
            if clause.is_tautology() {
                continue;
            }
            if !clause.is_unit() {
                self.watches.add_clause(&self.cnf[idx], idx);
                continue;
            }

            let lit = clause[0];
            match self.assignment.literal_value(lit) {
                Some(true) => {}
                Some(false) => {
                    let mut core = self.cnf[idx].premises.clone();
                    core.extend(self.analyser.ground_premises(&self.cnf, &self.trail, &[lit]));
                    return Some(Refutation {
                        core: core.into_iter().sorted_unstable().dedup().collect(),
                    });
                }
                None => self.enqueue(lit, Reason::Clause(idx)),
            }
        }
        None
    }

    fn learn(&mut self, analysis: Analysis) {
        let Analysis {
            learnt,
            backtrack_level,
            lbd,
            premises,
            bumped,
            involved,
        } = analysis;

        for cref in involved {
            self.manager.bump_involved_clause_activities(&mut self.cnf, cref);
        }
        self.selector.bumps(bumped);
        self.backtrack(backtrack_level);

        if let Some(endpoint) = &self.exchange {
            if learnt.len() <= self.options.share_max_len {
                endpoint.publish(SharedClause {
                    literals: learnt.clone(),
                    lbd,
                    premises: premises.clone(),
                    origin: endpoint.worker(),
                });
                self.stats.exported_clauses += 1;
            }
        }

        let asserting = learnt[0];
        let cref = self.cnf.add_learned(Clause::learned(learnt, lbd, premises));
        self.watches.add_clause(&self.cnf[cref], cref);
        self.manager.bump_involved_clause_activities(&mut self.cnf, cref);
        self.enqueue(asserting, Reason::Clause(cref));
        self.stats.learnt_clauses += 1;
    }

    /// Backtracks to level 0 and imports clauses shared by peers.
    fn restart(&mut self) -> Option<Refutation> {
        self.backtrack(0);
        self.stats.restarts += 1;
        self.import_shared()
    }

    /// Merges peer clauses at level 0. Each clause is re-validated against
    /// this worker's formula and simplified against level-0 facts.
    fn import_shared(&mut self) -> Option<Refutation> {
        let incoming = match &self.exchange {
            Some(endpoint) => endpoint.drain(),
            None => return None,
        };

        for shared in incoming {
            if shared
                .literals
                .iter()
                .any(|l| l.variable() as usize >= self.cnf.num_vars)
            {
                log::debug!("dropping shared clause from worker {} with unknown variables", shared.origin);
                continue;
            }
            let literals: ClauseLiterals = shared.literals.iter().copied().unique().collect();
            if literals.is_empty() || literals.iter().any(|l| literals.contains(&l.negated())) {
                continue;
            }

            let mut kept = ClauseLiterals::new();
            let mut falsified = Vec::new();
            let mut satisfied = false;
            for &lit in &literals {
                match self.assignment.literal_value(lit) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => falsified.push(lit),
                    None => kept.push(lit),
                }
            }
            if satisfied {
                continue;
            }

            let mut premises = shared.premises.clone();
            premises.extend(self.analyser.ground_premises(&self.cnf, &self.trail, &falsified));
            let premises: Vec<u32> = premises.into_iter().sorted_unstable().dedup().collect();
            self.stats.imported_clauses += 1;

            match kept.len() {
                0 => return Some(Refutation { core: premises }),
                1 => {
                    let lit = kept[0];
                    let cref = self.cnf.add_learned(Clause::learned(kept, 1, premises));
                    self.enqueue(lit, Reason::Clause(cref));
                }
                len => {
                    let lbd = shared.lbd.min(u32::try_from(len).unwrap_or(u32::MAX));
                    let cref = self.cnf.add_learned(Clause::learned(kept, lbd, premises));
                    self.watches.add_clause(&self.cnf[cref], cref);
                }
            }
        }
        None
    }

    fn search(&mut self) -> SolveOutcome {
        if let Some(refutation) = self.initialise() {
            return SolveOutcome::Unsat(refutation);
        }
        let start_conflicts = self.stats.conflicts;

        loop {
            if self.interrupt.is_raised() {
                return SolveOutcome::Timeout(TimeoutReason::Interrupted);
            }

            if let Some(cref) =
                self.watches
                    .propagate(&mut self.cnf, &mut self.trail, &mut self.assignment)
            {
                self.stats.conflicts += 1;
                match self.analyser.analyse(&self.cnf, &self.trail, cref) {
                    Conflict::Ground(core) => return SolveOutcome::Unsat(Refutation { core }),
                    Conflict::Learned(analysis) => self.learn(analysis),
                }
                self.selector.decay();
                self.manager.on_conflict(&mut self.cnf);

                let spent = (self.stats.conflicts - start_conflicts) as u64;
                if let Some(reason) = self.budget.exhausted(spent) {
                    return SolveOutcome::Timeout(reason);
                }

                if self.restarter.should_restart() {
                    if let Some(refutation) = self.restart() {
                        return SolveOutcome::Unsat(refutation);
                    }
                }

                if self.manager.should_clean_db(&self.cnf) {
                    self.manager
                        .clean_clause_db(&mut self.cnf, &mut self.trail, &mut self.watches);
                }
                continue;
            }

            if self.assignment.all_assigned() {
                return SolveOutcome::Sat(self.assignment.to_model());
            }

            let spent = (self.stats.conflicts - start_conflicts) as u64;
            if let Some(reason) = self.budget.exhausted(spent) {
                return SolveOutcome::Timeout(reason);
            }

            match self.selector.pick(&self.assignment) {
                Some(var) => self.decide(var),
                None => return SolveOutcome::Sat(self.assignment.to_model()),
            }
        }
    }

    /// The model of the last SAT result.
    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        self.finished.as_ref().and_then(SolveOutcome::model)
    }
}

impl<C: SolverConfig> Solver for Cdcl<C> {
    fn new(cnf: Cnf) -> Self {
        Self::with_options(cnf, CdclOptions::default())
    }

    /// Runs the search until a conclusive answer or the budget runs out.
    /// Conclusive answers are final: later calls return them again. After a
    /// timeout a later call resumes the search with whatever was learned.
    fn solve(&mut self) -> SolveOutcome {
        if let Some(outcome) = &self.finished {
            return outcome.clone();
        }
        let outcome = self.search();
        if outcome.is_conclusive() {
            self.finished = Some(outcome.clone());
        }
        outcome
    }

    fn stats(&self) -> SolutionStats {
        SolutionStats {
            propagations: self.watches.num_propagations(),
            removed_clauses: self.manager.num_removed(),
            ..self.stats
        }
    }
}
