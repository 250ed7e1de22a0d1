#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Resolver configuration.

use crate::sat::clause_management::ClauseManagementType;
use crate::sat::portfolio::PortfolioConfig;
use crate::sat::restarter::RestarterType;
use crate::sat::solver::Budget;
use crate::sat::variable_selection::VariableSelectionType;
use std::time::Duration;

/// Conflicts allowed for each sub-solve while minimising an unsatisfiable
/// core.
pub const DEFAULT_CORE_CONFLICT_BUDGET: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub portfolio: PortfolioConfig,
    /// Conflicts each portfolio worker may spend.
    pub max_conflicts: Option<u64>,
    /// Wall-clock limit for the solve.
    pub timeout: Option<Duration>,
    /// Treat a dependency that no known version satisfies as an input error
    /// instead of ruling out its dependent.
    pub strict_dependencies: bool,
    /// Shrink the unsatisfiable core before explaining it.
    pub minimise_core: bool,
    pub core_conflict_budget: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            portfolio: PortfolioConfig::default(),
            max_conflicts: None,
            timeout: None,
            strict_dependencies: false,
            minimise_core: true,
            core_conflict_budget: DEFAULT_CORE_CONFLICT_BUDGET,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.portfolio.workers = workers.max(1);
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.portfolio.base_seed = seed;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_conflict_budget(mut self, conflicts: u64) -> Self {
        self.max_conflicts = Some(conflicts);
        self
    }

    /// Worker `i` restarts with `restarts[i % restarts.len()]`.
    #[must_use]
    pub fn with_restarts(mut self, restarts: Vec<RestarterType>) -> Self {
        if !restarts.is_empty() {
            self.portfolio.restarts = restarts;
        }
        self
    }

    #[must_use]
    pub const fn with_variable_selection(mut self, selection: VariableSelectionType) -> Self {
        self.portfolio.variable_selection = selection;
        self
    }

    #[must_use]
    pub const fn with_clause_management(mut self, management: ClauseManagementType) -> Self {
        self.portfolio.clause_management = management;
        self
    }

    #[must_use]
    pub const fn with_strict_dependencies(mut self, strict: bool) -> Self {
        self.strict_dependencies = strict;
        self
    }

    #[must_use]
    pub const fn with_core_minimisation(mut self, minimise: bool) -> Self {
        self.minimise_core = minimise;
        self
    }

    /// The solver budget, with the deadline measured from now.
    #[must_use]
    pub fn budget(&self) -> Budget {
        let mut budget = Budget::unlimited();
        if let Some(conflicts) = self.max_conflicts {
            budget = budget.with_conflicts(conflicts);
        }
        if let Some(timeout) = self.timeout {
            budget = budget.with_timeout(timeout);
        }
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ResolverConfig::default()
            .with_workers(0)
            .with_seed(7)
            .with_conflict_budget(100)
            .with_restarts(vec![RestarterType::Fixed])
            .with_restarts(Vec::new())
            .with_strict_dependencies(true);
        assert_eq!(config.portfolio.workers, 1);
        assert_eq!(config.portfolio.base_seed, 7);
        assert_eq!(config.portfolio.restarts, vec![RestarterType::Fixed]);
        assert!(config.strict_dependencies);
        assert!(config.minimise_core);

        let budget = config.budget();
        assert_eq!(budget.max_conflicts, Some(100));
        assert!(budget.deadline.is_none());
        assert!(
            ResolverConfig::default()
                .with_timeout(Duration::from_secs(5))
                .budget()
                .deadline
                .is_some()
        );
    }
}
