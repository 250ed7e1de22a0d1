//! A package manager core that resolves dependencies with a CDCL SAT solver.

/// The `sat` module implements the SAT solver: a CDCL core with pluggable
/// heuristics, and a parallel portfolio of such solvers sharing learned
/// clauses.
pub mod sat;

/// The `resolver` module turns package requirements into CNF, solves it and
/// reduces the model to the packages the roots need.
pub mod resolver;
