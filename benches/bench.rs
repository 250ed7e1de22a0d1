use criterion::{Criterion, criterion_group, criterion_main};
use satpm::resolver::config::ResolverConfig;
use satpm::resolver::registry::{InMemoryRegistry, PackageManifest};
use satpm::resolver::version::Version;
use satpm::resolver::{Requirement, Resolver};
use satpm::sat::cdcl::Cdcl;
use satpm::sat::clause_management::LbdClauseManagement;
use satpm::sat::cnf::Cnf;
use satpm::sat::portfolio::{Portfolio, PortfolioConfig};
use satpm::sat::restarter::{Fixed, Geometric, Luby, Never, Restarter};
use satpm::sat::solver::{Budget, Solver, SolverConfig};
use satpm::sat::variable_selection::Vsids;
use std::hint::black_box;
use std::marker::PhantomData;
use std::time::Duration;

#[derive(Debug, Clone)]
struct RestarterConfig<R: Restarter>(PhantomData<R>);

impl<R: Restarter> SolverConfig for RestarterConfig<R> {
    type VariableSelector = Vsids;
    type Restarter = R;
    type ClauseManager = LbdClauseManagement;
}

/// Uniform random 3-SAT near the phase transition (4.26 clauses per variable).
fn random_3sat(num_vars: i32, seed: u64) -> Cnf {
    let mut rng = fastrand::Rng::with_seed(seed);
    let num_clauses = num_vars * 426 / 100;
    let clauses: Vec<Vec<i32>> = (0..num_clauses)
        .map(|_| {
            (0..3)
                .map(|_| {
                    let var = rng.i32(1..=num_vars);
                    if rng.bool() { var } else { -var }
                })
                .collect()
        })
        .collect();
    Cnf::new(clauses)
}

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

fn solve_all<C: SolverConfig>(cnfs: &[Cnf]) {
    for cnf in cnfs {
        let mut state: Cdcl<C> = Solver::new(cnf.clone());
        black_box(state.solve());
    }
}

fn bench_3sat(c: &mut Criterion) {
    let cnfs: Vec<Cnf> = (0..50).map(|seed| random_3sat(50, seed)).collect();

    let mut group = c.benchmark_group("3sat - restarter");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("Luby", |b| {
        b.iter(|| solve_all::<RestarterConfig<Luby>>(&cnfs));
    });
    group.bench_function("Geometric", |b| {
        b.iter(|| solve_all::<RestarterConfig<Geometric>>(&cnfs));
    });
    group.bench_function("Fixed", |b| {
        b.iter(|| solve_all::<RestarterConfig<Fixed>>(&cnfs));
    });
    group.bench_function("Never", |b| {
        b.iter(|| solve_all::<RestarterConfig<Never>>(&cnfs));
    });
    group.finish();
}

fn bench_portfolio(c: &mut Criterion) {
    let cnf = pigeonhole(8);

    let mut group = c.benchmark_group("pigeonhole 8 - portfolio workers");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    for workers in [1, 2, 4] {
        let portfolio = Portfolio::new(PortfolioConfig {
            workers,
            ..PortfolioConfig::default()
        });
        group.bench_function(format!("{workers} workers"), |b| {
            b.iter(|| black_box(portfolio.solve(&cnf, Budget::unlimited(), None)));
        });
    }
    group.finish();
}

/// A layered registry: every package depends on two packages of the next
/// layer with caret constraints over three major versions.
fn layered_registry(layers: usize, width: usize) -> InMemoryRegistry {
    let mut manifests = Vec::new();
    for layer in 0..layers {
        for index in 0..width {
            for major in 1..=3 {
                for minor in 0..3 {
                    let mut manifest =
                        PackageManifest::new(format!("l{layer}p{index}"), Version::new(major, minor, 0));
                    if layer + 1 < layers {
                        for offset in [0, 1] {
                            let target = format!("l{}p{}", layer + 1, (index + offset) % width);
                            let constraint = format!("^{}.0.0", (major + offset as u64 - 1) % 3 + 1);
                            if let Ok(constraint) = constraint.parse() {
                                manifest = manifest.with_dependency(target, constraint);
                            }
                        }
                    }
                    manifests.push(manifest);
                }
            }
        }
    }
    InMemoryRegistry::from_manifests(manifests).unwrap_or_default()
}

fn bench_resolve(c: &mut Criterion) {
    let registry = layered_registry(6, 8);
    let roots: Vec<Requirement> = (0..8)
        .filter_map(|i| format!("l0p{i}").parse().ok())
        .collect();

    let mut group = c.benchmark_group("resolve - layered registry");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("encode", |b| {
        let resolver = Resolver::new(&registry, ResolverConfig::default().with_workers(1));
        b.iter(|| black_box(resolver.encode(&roots)));
    });
    group.bench_function("resolve, 1 worker", |b| {
        let resolver = Resolver::new(&registry, ResolverConfig::default().with_workers(1));
        b.iter(|| black_box(resolver.resolve(&roots)));
    });
    group.bench_function("resolve, 4 workers", |b| {
        let resolver = Resolver::new(&registry, ResolverConfig::default().with_workers(4));
        b.iter(|| black_box(resolver.resolve(&roots)));
    });
    group.finish();
}

criterion_group!(benches, bench_3sat, bench_portfolio, bench_resolve);

criterion_main!(benches);
