#![allow(clippy::cast_precision_loss)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use satpm::resolver::config::ResolverConfig;
use satpm::resolver::error::{LockfileError, RegistryError, ResolveError, VersionError};
use satpm::resolver::lockfile::Lockfile;
use satpm::resolver::registry::{InMemoryRegistry, PackageManifest};
use satpm::resolver::{Requirement, Resolution, Resolver, merge_requirements};
use satpm::sat::clause_management::ClauseManagementType;
use satpm::sat::dimacs::{DimacsError, parse_file};
use satpm::sat::portfolio::{Portfolio, describe};
use satpm::sat::restarter::RestarterType;
use satpm::sat::solver::{SolutionStats, SolveOutcome};
use satpm::sat::variable_selection::VariableSelectionType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tikv_jemalloc_ctl::{epoch, stats};

/// Exit code of a successful run.
pub(crate) const EXIT_SUCCESS: i32 = 0;
/// Exit code when no solution exists.
pub(crate) const EXIT_FAILURE: i32 = 1;
/// Exit code for malformed input.
pub(crate) const EXIT_INVALID_INPUT: i32 = 2;
/// Exit code when the solver gave up.
pub(crate) const EXIT_TIMEOUT: i32 = 3;

/// Defines the command-line interface for the package manager.
#[derive(Parser, Debug)]
#[command(
    name = "satpm",
    version,
    about = "A package manager that resolves dependencies with a parallel SAT solver"
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Options shared by every command.
    #[command(flatten)]
    pub common: CommonOptions,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Resolve the given packages together with the installed roots and lock
    /// the result.
    Install {
        /// Package specs such as `http`, `http==1.2.3`, `http>=1.0,<2.0` or
        /// `http^2.0.0`.
        #[arg(required = true)]
        specs: Vec<String>,

        /// Resolve and print the plan without writing the lockfile.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Also write the encoded formula to this file in DIMACS format.
        #[arg(long, value_name = "FILE")]
        export_dimacs: Option<PathBuf>,
    },

    /// List installed packages, or every registry version with `--all`.
    List {
        /// Only show packages matching these specs.
        specs: Vec<String>,

        /// List the registry instead of the lockfile.
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Search package names and descriptions in the registry.
    Search {
        #[arg(required = true)]
        terms: Vec<String>,

        /// Consider pre-release versions when reporting the latest version.
        #[arg(long, default_value_t = false)]
        pre: bool,
    },

    /// Remove root packages and drop everything only they needed.
    Remove {
        #[arg(required = true)]
        names: Vec<String>,

        /// Print what would be removed without writing the lockfile.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Run the solver portfolio on a CNF file in DIMACS format.
    Solve {
        /// Path to the DIMACS .cnf file.
        path: PathBuf,

        /// Do not print the satisfying assignment.
        #[arg(long, default_value_t = false)]
        no_model: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// The shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CommonOptions {
    /// Registry file, or directory searched recursively for `*.json`
    /// manifests.
    #[arg(long, global = true, default_value = "registry")]
    pub(crate) registry: PathBuf,

    /// Lockfile read and written by `install`, `list` and `remove`.
    #[arg(long, global = true, default_value = "satpm.lock")]
    pub(crate) lockfile: PathBuf,

    /// Log more. Once for debug output, twice for trace output.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Print problem and search statistics.
    #[arg(long, global = true, default_value_t = false)]
    pub(crate) stats: bool,

    /// Number of solver threads. Defaults to the available parallelism, at
    /// most eight.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Base seed; worker `i` uses `seed + i`.
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,

    /// Give up after this many milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Give up after this many conflicts per worker.
    #[arg(long, global = true)]
    conflict_budget: Option<u64>,

    /// Restart strategy for every worker. By default workers alternate
    /// between Luby and geometric restarts.
    #[arg(long, global = true)]
    restart_strategy: Option<RestarterType>,

    #[arg(long, global = true, default_value_t = VariableSelectionType::Vsids)]
    variable_selection: VariableSelectionType,

    /// Keep every learned clause.
    #[arg(long, global = true, default_value_t = false)]
    no_clause_management: bool,

    /// Fail when a dependency has no matching version instead of ruling out
    /// the package that declares it.
    #[arg(long, global = true, default_value_t = false)]
    strict: bool,
}

impl CommonOptions {
    pub(crate) fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default()
            .with_seed(self.seed)
            .with_variable_selection(self.variable_selection)
            .with_strict_dependencies(self.strict);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(conflicts) = self.conflict_budget {
            config = config.with_conflict_budget(conflicts);
        }
        if let Some(restart) = self.restart_strategy {
            config = config.with_restarts(vec![restart]);
        }
        if self.no_clause_management {
            config = config.with_clause_management(ClauseManagementType::NoClauseManagement);
        }
        config
    }
}

/// Maps an error onto the process exit code.
pub(crate) fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<ResolveError>() {
        return e.exit_code();
    }
    let invalid_input = err.downcast_ref::<VersionError>().is_some()
        || err.downcast_ref::<RegistryError>().is_some()
        || err.downcast_ref::<LockfileError>().is_some()
        || err.downcast_ref::<DimacsError>().is_some();
    if invalid_input {
        EXIT_INVALID_INPUT
    } else {
        EXIT_FAILURE
    }
}

fn parse_specs(specs: &[String]) -> Result<Vec<Requirement>, VersionError> {
    specs.iter().map(|s| s.parse()).collect()
}

/// Resolves `specs` together with the roots already in the lockfile.
///
/// # Errors
///
/// Invalid specs, registry and lockfile failures, and resolution failures.
pub(crate) fn install(
    common: &CommonOptions,
    specs: &[String],
    dry_run: bool,
    export_dimacs: Option<&Path>,
) -> anyhow::Result<i32> {
    let requirements = merge_requirements(&parse_specs(specs)?);
    let registry = InMemoryRegistry::load(&common.registry)?;
    let lockfile = Lockfile::load_or_default(&common.lockfile)?;
    let roots = lockfile.merge_roots(&requirements);

    let config = common.resolver_config();
    let workers = config.portfolio.workers;
    let resolver = Resolver::new(&registry, config);

    let start = Instant::now();
    let (universe, encoding) = resolver.encode(&roots)?;
    let encode_time = start.elapsed();

    if let Some(path) = export_dimacs {
        std::fs::write(path, encoding.cnf.to_string())
            .with_context(|| format!("unable to write {}", path.display()))?;
        println!("DIMACS written to: {}", path.display());
    }

    let resolution = Resolution {
        encode_time,
        ..resolver.solve(&universe, &encoding)?
    };
    for package in &resolution.packages {
        match lockfile.find(&package.name) {
            None => println!("+ {} {}", package.name, package.version),
            Some(locked) if locked.version != package.version => println!(
                "~ {} {} -> {}",
                package.name, locked.version, package.version
            ),
            Some(_) => println!("  {} {}", package.name, package.version),
        }
    }
    for dropped in lockfile
        .packages
        .iter()
        .filter(|m| resolution.find(&m.name).is_none())
    {
        println!("- {} {}", dropped.name, dropped.version);
    }

    if common.stats {
        print_resolution_stats(&resolution, workers);
    }

    if dry_run {
        println!("Dry run: {} not written", common.lockfile.display());
    } else {
        Lockfile::new(roots, resolution.packages).save(&common.lockfile)?;
    }
    Ok(EXIT_SUCCESS)
}

fn matches_any(requirements: &[Requirement], manifest: &PackageManifest) -> bool {
    requirements.is_empty()
        || requirements
            .iter()
            .any(|r| r.name == manifest.name && r.constraint.matches(&manifest.version))
}

fn print_manifest(manifest: &PackageManifest) {
    if manifest.description.is_empty() {
        println!("{} {}", manifest.name, manifest.version);
    } else {
        println!("{} {}  {}", manifest.name, manifest.version, manifest.description);
    }
}

/// Prints locked packages, or registry versions with `all`.
///
/// # Errors
///
/// Invalid specs and registry or lockfile failures.
pub(crate) fn list(common: &CommonOptions, specs: &[String], all: bool) -> anyhow::Result<i32> {
    let requirements = parse_specs(specs)?;
    if all {
        let registry = InMemoryRegistry::load(&common.registry)?;
        for name in registry.names() {
            registry
                .versions(name)
                .iter()
                .filter(|m| matches_any(&requirements, m))
                .for_each(print_manifest);
        }
        return Ok(EXIT_SUCCESS);
    }

    let lockfile = Lockfile::load_or_default(&common.lockfile)?;
    if lockfile.packages.is_empty() {
        println!("No packages installed");
    }
    lockfile
        .packages
        .iter()
        .filter(|m| matches_any(&requirements, m))
        .for_each(print_manifest);
    Ok(EXIT_SUCCESS)
}

/// Prints the latest version of every package matching any of `terms`.
///
/// # Errors
///
/// Registry failures.
pub(crate) fn search(common: &CommonOptions, terms: &[String], pre: bool) -> anyhow::Result<i32> {
    let registry = InMemoryRegistry::load(&common.registry)?;
    let found: BTreeMap<&str, &PackageManifest> = terms
        .iter()
        .flat_map(|term| registry.search(term, pre))
        .map(|m| (m.name.as_str(), m))
        .collect();
    if found.is_empty() {
        println!("No packages match {}", terms.iter().join(", "));
    }
    found.values().copied().for_each(print_manifest);
    Ok(EXIT_SUCCESS)
}

/// Drops roots from the lockfile and prunes what they alone required.
///
/// # Errors
///
/// A missing lockfile, a name that is not a root, or a lockfile that no
/// longer satisfies its remaining roots.
pub(crate) fn remove(common: &CommonOptions, names: &[String], dry_run: bool) -> anyhow::Result<i32> {
    let lockfile = Lockfile::load(&common.lockfile)?;
    let (after, removed) = lockfile.remove(names)?;
    for package in &removed {
        println!("- {} {}", package.name, package.version);
    }
    if dry_run {
        println!("Dry run: {} not written", common.lockfile.display());
    } else {
        after.save(&common.lockfile)?;
    }
    Ok(EXIT_SUCCESS)
}

/// Solves a DIMACS file and prints the answer in competition format.
///
/// # Errors
///
/// If the file cannot be parsed or a model fails verification.
pub(crate) fn solve_dimacs(common: &CommonOptions, path: &Path, no_model: bool) -> anyhow::Result<i32> {
    let time = Instant::now();
    let cnf = parse_file(path)?;
    let parse_time = time.elapsed();
    log::info!(
        "parsed {} variables and {} clauses in {parse_time:.2?}",
        cnf.num_vars,
        cnf.len()
    );

    let config = common.resolver_config();
    let result = Portfolio::new(config.portfolio.clone()).solve(&cnf, config.budget(), None);

    let code = match &result.outcome {
        SolveOutcome::Sat(model) => {
            if let Some(clause) = cnf.first_violated(model) {
                return Err(ResolveError::InternalInvariantViolation(format!(
                    "model violates clause {clause}"
                ))
                .into());
            }
            println!("s SATISFIABLE");
            if !no_model {
                println!("v {model} 0");
            }
            EXIT_SUCCESS
        }
        SolveOutcome::Unsat(refutation) => {
            println!("s UNSATISFIABLE");
            if !refutation.core.is_empty() {
                println!(
                    "c core: {}",
                    refutation.core.iter().map(|id| id + 1).join(" ")
                );
            }
            EXIT_FAILURE
        }
        SolveOutcome::Timeout(reason) => {
            println!("s UNKNOWN");
            println!("c {reason}");
            EXIT_TIMEOUT
        }
    };

    if common.stats {
        print_problem_stats(parse_time, cnf.num_vars, cnf.len(), cnf.num_literals());
        print_search_stats(
            &result.total_stats(),
            result.stats.len(),
            result.winner,
            result.elapsed,
        );
        println!("Result: {}", describe(&result.outcome));
    }
    Ok(code)
}

/// Prints shell completions for the command line interface.
pub(crate) fn completions(shell: clap_complete::Shell) -> i32 {
    let mut cmd = <Cli as clap::CommandFactory>::command();
    clap_complete::generate(shell, &mut cmd, "satpm", &mut std::io::stdout());
    EXIT_SUCCESS
}

/// Helper function to print a formatted statistic line.
pub(crate) fn stat_line(label: &str, value: impl std::fmt::Display) {
    println!("|  {label:<28} {value:>18}  |");
}

/// Helper function to print a statistic line that includes a rate (value/second).
pub(crate) fn stat_line_with_rate(label: &str, value: usize, elapsed: f64) {
    let rate = if elapsed > 0.0 {
        value as f64 / elapsed
    } else {
        0.0
    };
    println!("|  {label:<20} {value:>12} ({rate:>9.0}/sec)  |");
}

/// Allocated and resident memory in MiB.
fn memory_usage() -> Result<(f64, f64), tikv_jemalloc_ctl::Error> {
    epoch::advance()?;
    let allocated = stats::allocated::mib()?.read()?;
    let resident = stats::resident::mib()?.read()?;
    Ok((
        allocated as f64 / (1024.0 * 1024.0),
        resident as f64 / (1024.0 * 1024.0),
    ))
}

fn print_problem_stats(time: Duration, num_vars: usize, num_clauses: usize, num_literals: usize) {
    println!("\n=======================[ Problem Statistics ]=========================");
    stat_line("Parse/encode time (s)", format!("{:.3}", time.as_secs_f64()));
    stat_line("Variables", num_vars);
    stat_line("Clauses (original)", num_clauses);
    stat_line("Literals (original)", num_literals);
}

fn print_search_stats(s: &SolutionStats, workers: usize, winner: Option<usize>, elapsed: Duration) {
    let elapsed_secs = elapsed.as_secs_f64();

    println!("========================[ Search Statistics ]========================");
    stat_line("Workers", workers);
    stat_line(
        "Winning worker",
        winner.map_or_else(|| "none".to_string(), |w| w.to_string()),
    );
    stat_line("Learnt clauses", s.learnt_clauses);
    stat_line("Removed clauses", s.removed_clauses);
    stat_line("Exported clauses", s.exported_clauses);
    stat_line("Imported clauses", s.imported_clauses);
    stat_line_with_rate("Conflicts", s.conflicts, elapsed_secs);
    stat_line_with_rate("Decisions", s.decisions, elapsed_secs);
    stat_line_with_rate("Propagations", s.propagations, elapsed_secs);
    stat_line_with_rate("Restarts", s.restarts, elapsed_secs);
    match memory_usage() {
        Ok((allocated, resident)) => {
            stat_line("Memory usage (MiB)", format!("{allocated:.2}"));
            stat_line("Resident memory (MiB)", format!("{resident:.2}"));
        }
        Err(e) => log::warn!("memory statistics unavailable: {e}"),
    }
    stat_line("Solve time (s)", format!("{elapsed_secs:.3}"));
    println!("=====================================================================");
}

fn print_resolution_stats(resolution: &Resolution, workers: usize) {
    print_problem_stats(
        resolution.encode_time,
        resolution.num_vars,
        resolution.num_clauses,
        resolution.num_literals,
    );
    stat_line("Versions selected", resolution.num_selected);
    stat_line("Packages resolved", resolution.packages.len());
    print_search_stats(
        &resolution.stats,
        workers,
        resolution.winner,
        resolution.elapsed,
    );
}
