#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Package dependency resolution on top of the SAT solver.
//!
//! [`Resolver::resolve`] runs the whole pipeline: the [`universe`] of
//! candidate versions is expanded from the root requirements, the
//! [`encoder`] turns it into CNF, the portfolio solves it, the model is
//! checked against every clause and the [`pruner`] reduces it to the
//! versions the roots actually need.

pub mod config;
pub mod constraint;
pub mod encoder;
pub mod error;
pub mod lockfile;
pub mod pruner;
pub mod registry;
pub mod universe;
pub mod version;

use crate::resolver::config::ResolverConfig;
use crate::resolver::constraint::VersionConstraint;
use crate::resolver::encoder::{Encoding, encode};
use crate::resolver::error::{ResolveError, VersionError};
use crate::resolver::registry::{PackageManifest, Registry};
use crate::resolver::universe::Universe;
use crate::sat::portfolio::Portfolio;
use crate::sat::solver::{Budget, SolutionStats, SolveOutcome};
use crate::sat::unsat_core::minimise_core;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// Characters that end the package name in a spec string.
const CONSTRAINT_START: &[char] = &['=', '!', '<', '>', '^', '~'];

/// A root requirement: a package name and the versions it accepts.
///
/// Written as `name`, `name==1.2.3`, `name>=1.0,<2.0` or `name^2.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl Requirement {
    #[must_use]
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }
}

impl FromStr for Requirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, constraint) = s
            .find(CONSTRAINT_START)
            .map_or((s, ""), |pos| s.split_at(pos));
        let name = name.trim();
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '@'));
        if !valid_name {
            return Err(VersionError::InvalidRequirement(s.to_string()));
        }
        Ok(Self::new(name, constraint.parse()?))
    }
}

impl TryFrom<String> for Requirement {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Requirement> for String {
    fn from(value: Requirement) -> Self {
        value.to_string()
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.name),
            c => write!(f, "{}{c}", self.name),
        }
    }
}

/// Combines requirements on the same package into one, intersecting their
/// constraints. Keeps the order in which names first appear.
#[must_use]
pub fn merge_requirements(requirements: &[Requirement]) -> Vec<Requirement> {
    let mut merged: Vec<Requirement> = Vec::new();
    for requirement in requirements {
        if let Some(existing) = merged.iter_mut().find(|r| r.name == requirement.name) {
            let constraint = std::mem::take(&mut existing.constraint);
            existing.constraint = constraint.intersect(requirement.constraint.clone());
        } else {
            merged.push(requirement.clone());
        }
    }
    merged
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved package versions, each after its dependencies.
    pub packages: Vec<PackageManifest>,
    /// Solver counters summed over the portfolio.
    pub stats: SolutionStats,
    pub winner: Option<usize>,
    /// Time spent building the universe and encoding it.
    pub encode_time: Duration,
    /// Time spent in the solver portfolio.
    pub elapsed: Duration,
    pub num_vars: usize,
    pub num_clauses: usize,
    pub num_literals: usize,
    /// Versions the model set true, before pruning.
    pub num_selected: usize,
}

impl Resolution {
    /// The resolved version of `name`, if it is part of the resolution.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PackageManifest> {
        self.packages.iter().find(|m| m.name == name)
    }
}

pub struct Resolver<'a, R: Registry + ?Sized> {
    registry: &'a R,
    config: ResolverConfig,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a, R: Registry + ?Sized> Resolver<'a, R> {
    #[must_use]
    pub const fn new(registry: &'a R, config: ResolverConfig) -> Self {
        Self {
            registry,
            config,
            interrupt: None,
        }
    }

    /// Cancels the solve when `flag` is raised.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Builds the universe for `requirements` and encodes it, without
    /// solving.
    ///
    /// # Errors
    ///
    /// Registry failures and requirements that cannot be encoded.
    pub fn encode(
        &self,
        requirements: &[Requirement],
    ) -> Result<(Universe, Encoding), ResolveError> {
        let requirements = merge_requirements(requirements);
        let start = Instant::now();
        let universe = Universe::build(self.registry, &requirements)?;
        let roots = universe.root_dependencies(&requirements);
        let encoding = encode(&universe, &roots, self.config.strict_dependencies)?;
        log::info!(
            "encoded {} versions into {} variables and {} clauses in {:.2?}",
            universe.len(),
            encoding.cnf.num_vars,
            encoding.cnf.len(),
            start.elapsed()
        );
        Ok((universe, encoding))
    }

    /// Resolves `requirements` to a set of package versions in dependency
    /// order.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`]: invalid input, no solution, budget exhausted or
    /// a solver result that fails verification.
    pub fn resolve(&self, requirements: &[Requirement]) -> Result<Resolution, ResolveError> {
        let start = Instant::now();
        let (universe, encoding) = self.encode(requirements)?;
        let encode_time = start.elapsed();
        self.solve(&universe, &encoding)
            .map(|resolution| Resolution {
                encode_time,
                ..resolution
            })
    }

    /// Solves a problem produced by [`Resolver::encode`]. The returned
    /// resolution has a zero `encode_time`.
    ///
    /// # Errors
    ///
    /// As [`Resolver::resolve`], minus the input errors caught by encoding.
    pub fn solve(
        &self,
        universe: &Universe,
        encoding: &Encoding,
    ) -> Result<Resolution, ResolveError> {
        let budget = self.config.budget();
        let portfolio = Portfolio::new(self.config.portfolio.clone());
        let result = portfolio.solve(&encoding.cnf, budget, self.interrupt.clone());
        let stats = result.total_stats();
        log::info!(
            "portfolio of {} finished in {:.2?}: {}",
            result.stats.len(),
            result.elapsed,
            crate::sat::portfolio::describe(&result.outcome)
        );

        match result.outcome {
            SolveOutcome::Sat(model) => {
                if let Some(clause) = encoding.cnf.first_violated(&model) {
                    return Err(ResolveError::InternalInvariantViolation(format!(
                        "model violates clause {clause}"
                    )));
                }
                let selected = encoding.selected(&model);
                let order = pruner::prune(universe, &selected, &encoding.roots)?;
                log::info!(
                    "resolved {} packages ({} selected before pruning)",
                    order.len(),
                    selected.len()
                );
                Ok(Resolution {
                    packages: order.iter().map(|&id| universe.manifest(id)).collect(),
                    stats,
                    winner: result.winner,
                    encode_time: Duration::ZERO,
                    elapsed: result.elapsed,
                    num_vars: encoding.cnf.num_vars,
                    num_clauses: encoding.cnf.len(),
                    num_literals: encoding.cnf.num_literals(),
                    num_selected: selected.len(),
                })
            }
            SolveOutcome::Unsat(refutation) => {
                let core = if self.config.minimise_core && !refutation.core.is_empty() {
                    let start = Instant::now();
                    let check_budget = Budget {
                        max_conflicts: Some(self.config.core_conflict_budget),
                        deadline: budget.deadline,
                    };
                    let minimal = minimise_core(&encoding.cnf, &refutation.core, check_budget);
                    log::debug!(
                        "core minimised from {} to {} clauses in {:.2?}",
                        refutation.core.len(),
                        minimal.len(),
                        start.elapsed()
                    );
                    minimal
                } else {
                    refutation.core
                };
                Err(ResolveError::Unsatisfiable(
                    encoding.explain(universe, &core),
                ))
            }
            SolveOutcome::Timeout(reason) => Err(ResolveError::Timeout {
                reason,
                conflicts: stats.conflicts,
                elapsed: result.elapsed,
            }),
        }
    }
}
