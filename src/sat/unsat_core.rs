#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Deletion-based minimisation of unsatisfiable cores.

use crate::sat::cdcl::Cdcl;
use crate::sat::cnf::Cnf;
use crate::sat::solver::{Budget, SolveOutcome, Solver, TimeoutReason};

/// Shrinks `core`, a set of original clause ids of `cnf` that is jointly
/// unsatisfiable, by trying to drop each clause in turn.
///
/// A clause stays when the remaining clauses are satisfiable, or when the
/// check does not finish within the conflict limit of `budget`, which applies
/// to each check separately. The deadline of `budget` bounds the whole
/// minimisation: once it passes, the remaining clauses are kept unchecked.
/// When a check proves UNSAT, the working set is narrowed to that check's own
/// core. With enough budget the result is a minimal unsatisfiable subset.
#[must_use]
pub fn minimise_core(cnf: &Cnf, core: &[u32], budget: Budget) -> Vec<u32> {
    let mut kept = core.to_vec();
    kept.sort_unstable();
    kept.dedup();

    for id in kept.clone() {
        if !kept.contains(&id) {
            continue;
        }
        let candidate: Vec<u32> = kept.iter().copied().filter(|&c| c != id).collect();
        let mut solver: Cdcl = Cdcl::new(cnf.subset(&candidate)).with_budget(budget);

        match solver.solve() {
            SolveOutcome::Unsat(refutation) if !refutation.core.is_empty() => {
                kept = refutation
                    .core
                    .iter()
                    .map(|&k| candidate[k as usize])
                    .collect();
            }
            SolveOutcome::Unsat(_) => kept = candidate,
            SolveOutcome::Sat(_) => {}
            SolveOutcome::Timeout(TimeoutReason::Deadline) => {
                log::warn!("core minimisation stopped at the deadline");
                break;
            }
            SolveOutcome::Timeout(reason) => {
                log::warn!("keeping clause {id} in core: check stopped ({reason})");
            }
        }
    }

    log::debug!("minimised core from {} to {} clauses", core.len(), kept.len());
    kept
}
