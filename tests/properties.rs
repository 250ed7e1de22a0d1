use proptest::prelude::*;
use satpm::resolver::config::ResolverConfig;
use satpm::resolver::constraint::VersionConstraint;
use satpm::resolver::error::{EncodingError, ResolveError};
use satpm::resolver::pruner::prune;
use satpm::resolver::registry::{InMemoryRegistry, PackageManifest};
use satpm::resolver::version::Version;
use satpm::resolver::{Requirement, Resolver};
use satpm::sat::assignment::Model;
use satpm::sat::cdcl::Cdcl;
use satpm::sat::cnf::Cnf;
use satpm::sat::portfolio::{Portfolio, PortfolioConfig};
use satpm::sat::solver::{Budget, CdclOptions, SolveOutcome, Solver};
use std::collections::HashMap;

fn brute_force(cnf: &Cnf) -> bool {
    let n = cnf.num_vars;
    (0..1u32 << n).any(|bits| {
        let model = Model::new((0..n).map(|i| (bits >> i) & 1 == 1).collect());
        cnf.verify(&model)
    })
}

fn clause() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec((1..=8i32, any::<bool>()), 1..=3)
        .prop_map(|lits| lits.into_iter().map(|(v, neg)| if neg { -v } else { v }).collect())
}

fn formula() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(clause(), 1..40)
}

fn solve_with_seed(cnf: &Cnf, seed: u64) -> Cdcl {
    let options = CdclOptions {
        seed,
        ..CdclOptions::default()
    };
    let mut solver = Cdcl::with_options(cnf.clone(), options);
    solver.solve();
    solver
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn solver_agrees_with_brute_force(clauses in formula(), seed in 0u64..4) {
        let cnf = Cnf::new(clauses);
        let expected = brute_force(&cnf);
        let mut solver = solve_with_seed(&cnf, seed);
        match solver.solve() {
            SolveOutcome::Sat(model) => {
                prop_assert!(expected);
                prop_assert!(cnf.verify(&model));
            }
            SolveOutcome::Unsat(refutation) => {
                prop_assert!(!expected);
                prop_assert!(!refutation.core.is_empty());
                prop_assert!(!brute_force(&cnf.subset(&refutation.core)));
            }
            SolveOutcome::Timeout(reason) => prop_assert!(false, "timed out: {reason}"),
        }
    }

    #[test]
    fn fixed_seed_is_deterministic(clauses in formula(), seed in 0u64..1000) {
        let cnf = Cnf::new(clauses);
        let mut first = solve_with_seed(&cnf, seed);
        let mut second = solve_with_seed(&cnf, seed);
        prop_assert_eq!(&first.trail, &second.trail);
        prop_assert_eq!(first.solve(), second.solve());
        prop_assert_eq!(first.stats(), second.stats());
    }

    #[test]
    fn portfolio_agrees_with_single_solver(clauses in formula()) {
        let cnf = Cnf::new(clauses);
        let single = solve_with_seed(&cnf, 0).solve();
        let config = PortfolioConfig { workers: 3, ..PortfolioConfig::default() };
        let result = Portfolio::new(config).solve(&cnf, Budget::unlimited(), None);
        prop_assert_eq!(
            matches!(single, SolveOutcome::Sat(_)),
            matches!(result.outcome, SolveOutcome::Sat(_))
        );
        if let SolveOutcome::Sat(model) = &result.outcome {
            prop_assert!(cnf.verify(model));
        }
        prop_assert!(result.outcome.is_conclusive());
    }
}

/// A registry whose dependency graph is acyclic: package `i` only depends on
/// packages with a larger index, and every constraint admits the newest
/// version, so the newest version of everything is always a solution.
fn acyclic_registry() -> impl Strategy<Value = Vec<PackageManifest>> {
    let package = (
        1..=3u64,
        prop::collection::vec((any::<prop::sample::Index>(), 0..3u8), 0..3),
    );
    prop::collection::vec(package, 2..10).prop_map(|packages| {
        let n = packages.len();
        let mut manifests = Vec::new();
        for (i, (versions, deps)) in packages.iter().enumerate() {
            for minor in 0..*versions {
                let mut manifest = PackageManifest::new(format!("pkg{i}"), Version::new(1, minor, 0));
                if i + 1 < n {
                    for (target, kind) in deps {
                        let j = i + 1 + target.index(n - i - 1);
                        let constraint = match kind {
                            0 => "*",
                            1 => ">=1.0.0",
                            _ => "^1.0.0",
                        };
                        manifest = manifest.with_dependency(format!("pkg{j}"), constraint.parse().unwrap());
                    }
                }
                manifests.push(manifest);
            }
        }
        manifests
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn acyclic_graphs_resolve_consistently(manifests in acyclic_registry(), seed in 0u64..100) {
        let registry = InMemoryRegistry::from_manifests(manifests).unwrap();
        let roots: Vec<Requirement> = vec!["pkg0".parse().unwrap()];
        let config = ResolverConfig::default().with_workers(1).with_seed(seed);
        let resolver = Resolver::new(&registry, config);

        let resolution = resolver.resolve(&roots).unwrap();
        let chosen: HashMap<&str, &Version> = resolution
            .packages
            .iter()
            .map(|m| (m.name.as_str(), &m.version))
            .collect();
        prop_assert_eq!(chosen.len(), resolution.packages.len());
        prop_assert_eq!(resolution.packages.last().map(|m| m.name.as_str()), Some("pkg0"));
        for (position, package) in resolution.packages.iter().enumerate() {
            for (dep, constraint) in &package.dependencies {
                let version = chosen.get(dep.as_str());
                prop_assert!(version.is_some_and(|v| constraint.matches(v)));
                let dep_position = resolution.packages.iter().position(|m| &m.name == dep);
                prop_assert!(dep_position.is_some_and(|p| p < position));
            }
        }

        let (universe, encoding) = resolver.encode(&roots).unwrap();
        let options = CdclOptions { seed, ..CdclOptions::default() };
        let mut solver: Cdcl = Cdcl::with_options(encoding.cnf.clone(), options);
        let SolveOutcome::Sat(model) = solver.solve() else {
            return Err(TestCaseError::fail("satisfiable by construction"));
        };
        prop_assert!(encoding.cnf.verify(&model));
        let selected = encoding.selected(&model);
        let mut per_name = HashMap::new();
        for &id in &selected {
            *per_name.entry(universe.get(id).name).or_insert(0) += 1;
        }
        prop_assert!(per_name.values().all(|&count| count == 1));

        let pruned = prune(&universe, &selected, &encoding.roots).unwrap();
        prop_assert!(pruned.len() <= selected.len());
        prop_assert_eq!(prune(&universe, &pruned, &encoding.roots).unwrap(), pruned);
    }
}

const CONSTRAINTS: [&str; 6] = ["*", "==1.0.0", ">=1.1.0", "<1.1.0", "==1.2.0", "!=1.0.0"];

/// Edges of one version: dependencies and conflicts as (target, constraint)
/// picks. The target never names the version's own package.
type Edges = (Vec<(prop::sample::Index, usize)>, Vec<(prop::sample::Index, usize)>);

fn edges() -> impl Strategy<Value = Edges> {
    let edge = (any::<prop::sample::Index>(), 0..CONSTRAINTS.len());
    (
        prop::collection::vec(edge.clone(), 0..3),
        prop::collection::vec(edge, 0..2),
    )
}

fn constraint(pick: usize) -> VersionConstraint {
    CONSTRAINTS[pick].parse().unwrap()
}

/// Up to four packages with one to three versions each, arbitrary
/// dependency cycles, conflicts and pins, plus one or two root requirements.
fn small_problem() -> impl Strategy<Value = (Vec<PackageManifest>, Vec<Requirement>)> {
    let package = (1..=3u64, prop::collection::vec(edges(), 3));
    let roots = prop::collection::vec((any::<prop::sample::Index>(), 0..CONSTRAINTS.len()), 1..=2);
    (prop::collection::vec(package, 2..=4), roots).prop_map(|(packages, roots)| {
        let n = packages.len();
        let mut manifests = Vec::new();
        for (i, (versions, edges)) in packages.iter().enumerate() {
            for (minor, (deps, conflicts)) in edges.iter().take(*versions as usize).enumerate() {
                let mut manifest =
                    PackageManifest::new(format!("pkg{i}"), Version::new(1, minor as u64, 0));
                for (target, pick) in deps {
                    let j = (i + 1 + target.index(n - 1)) % n;
                    manifest = manifest.with_dependency(format!("pkg{j}"), constraint(*pick));
                }
                for (target, pick) in conflicts {
                    let j = (i + 1 + target.index(n - 1)) % n;
                    manifest = manifest.with_conflict(format!("pkg{j}"), constraint(*pick));
                }
                manifests.push(manifest);
            }
        }
        let roots = roots
            .iter()
            .map(|(target, pick)| Requirement::new(format!("pkg{}", target.index(n)), constraint(*pick)))
            .collect();
        (manifests, roots)
    })
}

/// Every package installed at most once, every root and dependency met, no
/// declared conflict between installed versions.
fn consistent(chosen: &HashMap<&str, &PackageManifest>, roots: &[Requirement]) -> bool {
    let installed = |name: &str, constraint: &VersionConstraint| {
        chosen.get(name).is_some_and(|m| constraint.matches(&m.version))
    };
    roots.iter().all(|r| installed(&r.name, &r.constraint))
        && chosen.values().all(|m| {
            m.dependencies.iter().all(|(dep, c)| installed(dep, c))
                && !m.conflicts.iter().any(|(other, c)| installed(other, c))
        })
}

/// Tries every choice of "absent or one version" for every package name.
fn brute_force_resolvable(manifests: &[PackageManifest], roots: &[Requirement]) -> bool {
    let mut by_name: HashMap<&str, Vec<&PackageManifest>> = HashMap::new();
    for m in manifests {
        by_name.entry(m.name.as_str()).or_default().push(m);
    }
    let candidates: Vec<&Vec<&PackageManifest>> = by_name.values().collect();
    let total: usize = candidates.iter().map(|c| c.len() + 1).product();
    (0..total).any(|mut code| {
        let chosen: HashMap<&str, &PackageManifest> = candidates
            .iter()
            .filter_map(|versions| {
                let pick = code % (versions.len() + 1);
                code /= versions.len() + 1;
                pick.checked_sub(1).map(|k| (versions[k].name.as_str(), versions[k]))
            })
            .collect();
        consistent(&chosen, roots)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn registries_with_conflicts_agree_with_brute_force(
        (manifests, roots) in small_problem(),
        seed in 0u64..100,
    ) {
        let expected = brute_force_resolvable(&manifests, &roots);
        let registry = InMemoryRegistry::from_manifests(manifests).unwrap();
        let config = ResolverConfig::default().with_workers(2).with_seed(seed);

        match Resolver::new(&registry, config).resolve(&roots) {
            Ok(resolution) => {
                prop_assert!(expected);
                let chosen: HashMap<&str, &PackageManifest> = resolution
                    .packages
                    .iter()
                    .map(|m| (m.name.as_str(), m))
                    .collect();
                prop_assert_eq!(chosen.len(), resolution.packages.len());
                prop_assert!(consistent(&chosen, &roots));
            }
            Err(
                ResolveError::Unsatisfiable(_)
                | ResolveError::Encoding(EncodingError::NoMatchingVersion { .. }),
            ) => prop_assert!(!expected),
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
