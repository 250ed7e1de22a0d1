#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Parallel portfolio of CDCL solvers.
//!
//! Every worker solves its own copy of the formula with a distinct seed and
//! restart policy, publishing short learned clauses to its peers. The first
//! conclusive answer stops everyone; among all conclusive answers the one
//! from the lowest worker index is reported, so the result does not depend on
//! thread timing whenever several workers finish.

use crate::sat::cdcl::Cdcl;
use crate::sat::clause_management::ClauseManagementType;
use crate::sat::cnf::Cnf;
use crate::sat::exchange::{ClauseExchange, DEFAULT_INBOX_CAPACITY};
use crate::sat::restarter::RestarterType;
use crate::sat::solver::{
    Budget, CdclOptions, DynamicConfig, Interrupt, SolutionStats, SolveOutcome, Solver,
    TimeoutReason,
};
use crate::sat::variable_selection::VariableSelectionType;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioConfig {
    pub workers: usize,
    /// Worker `i` runs with seed `base_seed + i`.
    pub base_seed: u64,
    /// Worker `i` uses `restarts[i % restarts.len()]`.
    pub restarts: Vec<RestarterType>,
    pub variable_selection: VariableSelectionType,
    pub clause_management: ClauseManagementType,
    pub options: CdclOptions,
    pub exchange_capacity: usize,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(MAX_DEFAULT_WORKERS);
        Self {
            workers,
            base_seed: 0,
            restarts: vec![RestarterType::Luby, RestarterType::Geometric],
            variable_selection: VariableSelectionType::default(),
            clause_management: ClauseManagementType::default(),
            options: CdclOptions::default(),
            exchange_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioOutcome {
    pub outcome: SolveOutcome,
    /// Index of the worker whose answer was taken.
    pub winner: Option<usize>,
    /// Per-worker statistics, by worker index.
    pub stats: Vec<SolutionStats>,
    pub elapsed: Duration,
}

impl PortfolioOutcome {
    #[must_use]
    pub fn total_stats(&self) -> SolutionStats {
        self.stats
            .iter()
            .fold(SolutionStats::default(), |acc, s| acc.merge(*s))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    config: PortfolioConfig,
}

impl Portfolio {
    #[must_use]
    pub const fn new(config: PortfolioConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    fn worker(&self, index: usize, cnf: &Cnf) -> Cdcl<DynamicConfig> {
        let seed = self.config.base_seed.wrapping_add(index as u64);
        let options = CdclOptions {
            seed,
            ..self.config.options
        };
        let restart = if self.config.restarts.is_empty() {
            RestarterType::default()
        } else {
            self.config.restarts[index % self.config.restarts.len()]
        };
        Cdcl::from_parts(
            cnf.clone(),
            options,
            self.config
                .variable_selection
                .to_impl(cnf.num_vars, seed),
            restart.to_impl(options.restart_unit),
            self.config.clause_management.to_impl(options.reduction),
        )
    }

    /// Solves `cnf` under `budget`. Raising `external` cancels every worker.
    #[must_use]
    pub fn solve(
        &self,
        cnf: &Cnf,
        budget: Budget,
        external: Option<Arc<AtomicBool>>,
    ) -> PortfolioOutcome {
        let start = Instant::now();
        let workers = self.config.workers.max(1);

        if workers == 1 {
            let interrupt = external.clone().map(Interrupt::new).unwrap_or_default();
            let mut solver = self
                .worker(0, cnf)
                .with_budget(budget)
                .with_interrupt(interrupt);
            let outcome = solver.solve();
            return PortfolioOutcome {
                winner: outcome.is_conclusive().then_some(0),
                outcome,
                stats: vec![solver.stats()],
                elapsed: start.elapsed(),
            };
        }

        let stop = Arc::new(AtomicBool::new(false));
        let exchange = ClauseExchange::new(workers, self.config.exchange_capacity);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut results: Vec<Option<(SolveOutcome, SolutionStats)>> = vec![None; workers];

        thread::scope(|scope| {
            for index in 0..workers {
                let mut interrupt = Interrupt::new(Arc::clone(&stop));
                if let Some(flag) = &external {
                    interrupt = interrupt.and(Arc::clone(flag));
                }
                let endpoint = exchange.endpoint(index);
                let tx = tx.clone();
                scope.spawn(move || {
                    let mut solver = self
                        .worker(index, cnf)
                        .with_budget(budget)
                        .with_interrupt(interrupt)
                        .with_exchange(endpoint);
                    let outcome = solver.solve();
                    tx.send((index, outcome, solver.stats())).ok();
                });
            }
            drop(tx);

            for (index, outcome, stats) in &rx {
                log::debug!(
                    "worker {index} finished after {} conflicts: {}",
                    stats.conflicts,
                    describe(&outcome)
                );
                if outcome.is_conclusive() {
                    stop.store(true, Ordering::Relaxed);
                }
                results[index] = Some((outcome, stats));
            }
        });

        let stats = results
            .iter()
            .map(|r| r.as_ref().map(|(_, s)| *s).unwrap_or_default())
            .collect();
        let winner = results
            .iter()
            .position(|r| r.as_ref().is_some_and(|(o, _)| o.is_conclusive()));

        let outcome = match winner.and_then(|w| results[w].take()) {
            Some((outcome, _)) => outcome,
            None if external.is_some_and(|f| f.load(Ordering::Relaxed)) => {
                SolveOutcome::Timeout(TimeoutReason::Interrupted)
            }
            None => results
                .into_iter()
                .flatten()
                .map(|(outcome, _)| outcome)
                .next()
                .unwrap_or(SolveOutcome::Timeout(TimeoutReason::Interrupted)),
        };

        PortfolioOutcome {
            outcome,
            winner,
            stats,
            elapsed: start.elapsed(),
        }
    }
}

/// One-line summary of an outcome for logs and reports.
#[must_use]
pub fn describe(outcome: &SolveOutcome) -> String {
    match outcome {
        SolveOutcome::Sat(_) => "SAT".to_string(),
        SolveOutcome::Unsat(r) => format!("UNSAT (core of {} clauses)", r.core.len()),
        SolveOutcome::Timeout(reason) => format!("unknown ({reason})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pigeonhole(pigeons: i32) -> Cnf {
        let holes = pigeons - 1;
        let var = |p: i32, h: i32| p * holes + h + 1;
        let mut clauses: Vec<Vec<i32>> = (0..pigeons)
            .map(|p| (0..holes).map(|h| var(p, h)).collect())
            .collect();
        for h in 0..holes {
            for p in 0..pigeons {
                for q in p + 1..pigeons {
                    clauses.push(vec![-var(p, h), -var(q, h)]);
                }
            }
        }
        Cnf::new(clauses)
    }

    fn config(workers: usize) -> PortfolioConfig {
        PortfolioConfig {
            workers,
            ..PortfolioConfig::default()
        }
    }

    #[test]
    fn test_portfolio_sat() {
        let cnf = Cnf::new(vec![
            vec![1, 2, 3],
            vec![-1, -2],
            vec![-2, -3],
            vec![-1, -3],
            vec![4, -1],
        ]);
        let result = Portfolio::new(config(4)).solve(&cnf, Budget::unlimited(), None);
        let model = result.outcome.model().expect("satisfiable");
        assert!(cnf.verify(model));
        assert!(result.winner.is_some());
        assert_eq!(result.stats.len(), 4);
    }

    #[test]
    fn test_portfolio_unsat_agrees_with_single_solver() {
        let cnf = pigeonhole(6);
        let result = Portfolio::new(config(3)).solve(&cnf, Budget::unlimited(), None);
        let SolveOutcome::Unsat(refutation) = result.outcome else {
            panic!("expected UNSAT");
        };
        let mut check: Cdcl = Cdcl::new(cnf.subset(&refutation.core));
        assert!(matches!(check.solve(), SolveOutcome::Unsat(_)));
    }

    #[test]
    fn test_single_worker_runs_inline() {
        let cnf = pigeonhole(4);
        let result = Portfolio::new(config(1)).solve(&cnf, Budget::unlimited(), None);
        assert!(matches!(result.outcome, SolveOutcome::Unsat(_)));
        assert_eq!(result.winner, Some(0));
        assert_eq!(result.stats.len(), 1);
    }

    #[test]
    fn test_all_workers_out_of_budget() {
        let cnf = pigeonhole(8);
        let result = Portfolio::new(config(2)).solve(
            &cnf,
            Budget::unlimited().with_conflicts(3),
            None,
        );
        assert_eq!(
            result.outcome,
            SolveOutcome::Timeout(TimeoutReason::ConflictBudget)
        );
        assert_eq!(result.winner, None);
        assert!(result.stats.iter().all(|s| s.conflicts == 3));
    }

    #[test]
    fn test_external_cancellation() {
        let flag = Arc::new(AtomicBool::new(true));
        let result = Portfolio::new(config(2)).solve(&pigeonhole(8), Budget::unlimited(), Some(flag));
        assert_eq!(
            result.outcome,
            SolveOutcome::Timeout(TimeoutReason::Interrupted)
        );
    }

    #[test]
    fn test_total_stats() {
        let result = Portfolio::new(config(2)).solve(&pigeonhole(5), Budget::unlimited(), None);
        let total = result.total_stats();
        assert_eq!(
            total.conflicts,
            result.stats.iter().map(|s| s.conflicts).sum::<usize>()
        );
    }
}
