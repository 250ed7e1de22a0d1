#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Translation of a dependency problem into CNF.
//!
//! Package version `i` of the universe is variable `i`. Auxiliary variables
//! of the sequential-counter at-most-one encoding come after all package
//! variables and map to no package. Every clause records a [`ClauseOrigin`]
//! so that an unsatisfiable core can be explained in package terms.

use crate::resolver::constraint::VersionConstraint;
use crate::resolver::error::EncodingError;
use crate::resolver::universe::{Dependency, PackageId, PackageName, Universe};
use crate::sat::assignment::Model;
use crate::sat::cnf::Cnf;
use crate::sat::literal::{Literal, Variable};
use itertools::Itertools;
use rustc_hash::FxHashSet;
use std::fmt::{Display, Formatter};

/// Packages with at most this many candidates get pairwise exclusion
/// clauses; larger ones use a sequential counter.
pub const AMO_PAIRWISE_LIMIT: usize = 8;

/// Why a clause exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseOrigin {
    Root(Dependency),
    Dependency {
        dependent: PackageId,
        dependency: Dependency,
    },
    /// A dependency no version satisfies.
    MissingDependency {
        dependent: PackageId,
        dependency: Dependency,
    },
    AtMostOne(PackageName),
    Conflict {
        package: PackageId,
        other: PackageId,
    },
}

/// Dense bijection between package versions and the first variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableMap {
    num_packages: usize,
}

impl VariableMap {
    #[must_use]
    pub const fn variable(&self, id: PackageId) -> Variable {
        id.0
    }

    /// The package behind `var`, or `None` for auxiliary variables.
    #[must_use]
    pub fn package(&self, var: Variable) -> Option<PackageId> {
        ((var as usize) < self.num_packages).then_some(PackageId(var))
    }

    #[must_use]
    pub const fn num_packages(&self) -> usize {
        self.num_packages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub cnf: Cnf,
    pub variables: VariableMap,
    /// Origin of each original clause, by clause id.
    pub origins: Vec<ClauseOrigin>,
    pub roots: Vec<Dependency>,
}

/// Encodes `roots` over `universe`.
///
/// A dependency with no matching version forbids its dependent, unless
/// `strict` is set, in which case it is an error.
///
/// # Errors
///
/// A root with no matching version, or in strict mode a dependency with no
/// matching version.
pub fn encode(
    universe: &Universe,
    roots: &[Dependency],
    strict: bool,
) -> Result<Encoding, EncodingError> {
    let mut encoder = Encoder {
        cnf: Cnf::with_vars(universe.len()),
        origins: Vec::new(),
    };

    for root in roots {
        let candidates = universe.matching(root.name, &root.constraint);
        if candidates.is_empty() {
            return Err(EncodingError::NoMatchingVersion {
                name: universe.name(root.name).to_string(),
                constraint: root.constraint.clone(),
            });
        }
        encoder.push(
            candidates.iter().map(|id| Literal::positive(id.0)),
            ClauseOrigin::Root(root.clone()),
        );
    }

    for name in universe.names() {
        encoder.at_most_one(universe.versions_of(name), name);
    }

    let mut conflicts: FxHashSet<(PackageId, PackageId)> = FxHashSet::default();
    for id in universe.ids() {
        let package = universe.get(id);
        for dep in &package.dependencies {
            let candidates = universe.matching(dep.name, &dep.constraint);
            if candidates.is_empty() {
                if strict {
                    return Err(EncodingError::MissingDependency {
                        dependent: universe.display(id).to_string(),
                        dependency: universe.name(dep.name).to_string(),
                        constraint: dep.constraint.clone(),
                    });
                }
                log::debug!(
                    "{} can never be installed: no version of {} matches {}",
                    universe.display(id),
                    universe.name(dep.name),
                    dep.constraint
                );
                encoder.push(
                    [Literal::negative(id.0)],
                    ClauseOrigin::MissingDependency {
                        dependent: id,
                        dependency: dep.clone(),
                    },
                );
                continue;
            }
            encoder.push(
                std::iter::once(Literal::negative(id.0))
                    .chain(candidates.iter().map(|c| Literal::positive(c.0))),
                ClauseOrigin::Dependency {
                    dependent: id,
                    dependency: dep.clone(),
                },
            );
        }

        for conflict in &package.conflicts {
            for other in universe.matching(conflict.name, &conflict.constraint) {
                let key = (id.min(other), id.max(other));
                if other == id || !conflicts.insert(key) {
                    continue;
                }
                encoder.push(
                    [Literal::negative(id.0), Literal::negative(other.0)],
                    ClauseOrigin::Conflict { package: id, other },
                );
            }
        }
    }

    log::debug!(
        "encoded {} package versions as {} variables and {} clauses",
        universe.len(),
        encoder.cnf.num_vars,
        encoder.cnf.len()
    );

    Ok(Encoding {
        cnf: encoder.cnf,
        variables: VariableMap {
            num_packages: universe.len(),
        },
        origins: encoder.origins,
        roots: roots.to_vec(),
    })
}

struct Encoder {
    cnf: Cnf,
    origins: Vec<ClauseOrigin>,
}

impl Encoder {
    fn push<I: IntoIterator<Item = Literal>>(&mut self, literals: I, origin: ClauseOrigin) {
        self.cnf.add_clause(literals);
        self.origins.push(origin);
    }

    fn at_most_one(&mut self, versions: &[PackageId], name: PackageName) {
        let n = versions.len();
        if n < 2 {
            return;
        }
        let lits: Vec<Literal> = versions.iter().map(|id| Literal::negative(id.0)).collect();

        if n <= AMO_PAIRWISE_LIMIT {
            for (a, b) in lits.iter().tuple_combinations() {
                self.push([*a, *b], ClauseOrigin::AtMostOne(name));
            }
            return;
        }

        // s[i] is true once one of the first i + 1 versions is selected.
        let s: Vec<Literal> = (0..n - 1)
            .map(|_| Literal::positive(self.cnf.new_var()))
            .collect();
        let origin = ClauseOrigin::AtMostOne(name);
        self.push([lits[0], s[0]], origin.clone());
        for i in 1..n - 1 {
            self.push([lits[i], s[i]], origin.clone());
            self.push([s[i - 1].negated(), s[i]], origin.clone());
            self.push([lits[i], s[i - 1].negated()], origin.clone());
        }
        self.push([lits[n - 1], s[n - 2].negated()], origin);
    }
}

impl Encoding {
    /// Package versions set true in `model`, in id order.
    #[must_use]
    pub fn selected(&self, model: &Model) -> Vec<PackageId> {
        model
            .true_vars()
            .filter_map(|var| self.variables.package(var))
            .collect()
    }

    /// Renders the clauses in `core` as distinct causes, in core order.
    #[must_use]
    pub fn explain(&self, universe: &Universe, core: &[u32]) -> Explanation {
        let causes = core
            .iter()
            .filter_map(|&id| self.origins.get(id as usize))
            .map(|origin| describe(universe, origin))
            .unique()
            .collect();
        Explanation { causes }
    }
}

fn describe(universe: &Universe, origin: &ClauseOrigin) -> String {
    let requirement = |dep: &Dependency| match &dep.constraint {
        VersionConstraint::Any => universe.name(dep.name).to_string(),
        c => format!("{} {c}", universe.name(dep.name)),
    };
    match origin {
        ClauseOrigin::Root(root) => format!("root requires {}", requirement(root)),
        ClauseOrigin::Dependency {
            dependent,
            dependency,
        } => format!(
            "{} depends on {}",
            universe.display(*dependent),
            requirement(dependency)
        ),
        ClauseOrigin::MissingDependency {
            dependent,
            dependency,
        } => format!(
            "{} depends on {}, which no known version satisfies",
            universe.display(*dependent),
            requirement(dependency)
        ),
        ClauseOrigin::AtMostOne(name) => {
            format!("only one version of {} can be installed", universe.name(*name))
        }
        ClauseOrigin::Conflict { package, other } => format!(
            "{} conflicts with {}",
            universe.display(*package),
            universe.display(*other)
        ),
    }
}

/// Human-readable causes of an unsatisfiable resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Explanation {
    pub causes: Vec<String>,
}

impl Display for Explanation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no set of packages satisfies every requirement")?;
        if !self.causes.is_empty() {
            write!(f, ":")?;
        }
        for cause in &self.causes {
            write!(f, "\n  - {cause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::registry::{InMemoryRegistry, PackageManifest};
    use crate::resolver::Requirement;
    use crate::sat::cdcl::Cdcl;
    use crate::sat::solver::{SolveOutcome, Solver};

    fn manifest(name: &str, version: &str) -> PackageManifest {
        PackageManifest::new(name, version.parse().unwrap())
    }

    fn setup(manifests: Vec<PackageManifest>, roots: &[&str]) -> (Universe, Vec<Dependency>) {
        let registry = InMemoryRegistry::from_manifests(manifests).unwrap();
        let roots: Vec<Requirement> = roots.iter().map(|r| r.parse().unwrap()).collect();
        let universe = Universe::build(&registry, &roots).unwrap();
        let deps = universe.root_dependencies(&roots);
        (universe, deps)
    }

    fn all_models(cnf: &Cnf) -> Vec<Model> {
        let n = cnf.num_vars;
        (0..1u32 << n)
            .map(|bits| Model::new((0..n).map(|i| (bits >> i) & 1 == 1).collect()))
            .filter(|m| cnf.verify(m))
            .collect()
    }

    #[test]
    fn test_pairwise_exclusion_and_root() {
        let (universe, roots) = setup(
            vec![manifest("a", "1.0"), manifest("a", "2.0"), manifest("a", "3.0")],
            &["a>=2"],
        );
        let encoding = encode(&universe, &roots, false).unwrap();
        // One root clause and three exclusion pairs.
        assert_eq!(encoding.cnf.len(), 4);
        assert_eq!(encoding.origins[0], ClauseOrigin::Root(roots[0].clone()));

        for model in all_models(&encoding.cnf) {
            let selected = encoding.selected(&model);
            assert_eq!(selected.len(), 1);
            assert!(universe.get(selected[0]).version.major >= 2);
        }
    }

    #[test]
    fn test_sequential_counter_allows_at_most_one() {
        let manifests = (1..=10).map(|v| manifest("big", &v.to_string())).collect();
        let (universe, roots) = setup(manifests, &["big"]);
        let encoding = encode(&universe, &roots, false).unwrap();
        assert_eq!(encoding.cnf.num_vars, 10 + 9);
        assert_eq!(encoding.variables.package(12), None);

        let mut solver: Cdcl = Cdcl::new(encoding.cnf.clone());
        let model = solver.solve().model().cloned().unwrap();
        assert_eq!(encoding.selected(&model).len(), 1);

        // Forcing two versions true must be unsatisfiable.
        let mut forced = encoding.cnf.clone();
        forced.add_clause([Literal::positive(0)]);
        forced.add_clause([Literal::positive(7)]);
        let mut solver: Cdcl = Cdcl::new(forced);
        assert!(matches!(solver.solve(), SolveOutcome::Unsat(_)));
    }

    #[test]
    fn test_missing_dependency() {
        let manifests = vec![
            manifest("a", "1.0").with_dependency("b", ">=5".parse().unwrap()),
            manifest("b", "1.0"),
        ];
        let (universe, roots) = setup(manifests, &["a"]);
        let encoding = encode(&universe, &roots, false).unwrap();
        assert!(encoding
            .origins
            .iter()
            .any(|o| matches!(o, ClauseOrigin::MissingDependency { .. })));

        let err = encode(&universe, &roots, true).unwrap_err();
        assert!(matches!(err, EncodingError::MissingDependency { .. }));
    }

    #[test]
    fn test_root_without_match() {
        let (universe, roots) = setup(vec![manifest("a", "1.0")], &["a^2"]);
        assert_eq!(
            encode(&universe, &roots, false).unwrap_err(),
            EncodingError::NoMatchingVersion {
                name: "a".to_string(),
                constraint: "^2".parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_conflicts_emitted_once() {
        let manifests = vec![
            manifest("a", "1.0")
                .with_dependency("b", "*".parse().unwrap())
                .with_conflict("b", "*".parse().unwrap()),
            manifest("b", "1.0").with_conflict("a", "*".parse().unwrap()),
        ];
        let (universe, roots) = setup(manifests, &["a"]);
        let encoding = encode(&universe, &roots, false).unwrap();
        let conflicts = encoding
            .origins
            .iter()
            .filter(|o| matches!(o, ClauseOrigin::Conflict { .. }))
            .count();
        assert_eq!(conflicts, 1);

        let mut solver: Cdcl = Cdcl::new(encoding.cnf.clone());
        let SolveOutcome::Unsat(refutation) = solver.solve() else {
            panic!("expected UNSAT");
        };
        let explanation = encoding.explain(&universe, &refutation.core);
        assert!(explanation.causes.contains(&"root requires a".to_string()));
        assert!(explanation
            .causes
            .contains(&"a 1.0.0 conflicts with b 1.0.0".to_string()));
    }
}
