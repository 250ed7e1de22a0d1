//! # satpm
//!
//! `satpm` resolves package dependencies by encoding them as a SAT problem
//! and solving it with a portfolio of CDCL solvers running in parallel.
//!
//! ## Usage
//!
//! ```sh
//! satpm [GLOBAL_OPTIONS] <COMMAND>
//! ```
//!
//! -   **`install <spec>...`**: resolve the specs together with the roots in
//!     the lockfile and write the result (`--dry-run` only prints the plan,
//!     `--export-dimacs <FILE>` also writes the encoded formula).
//! -   **`list [<spec>...]`**: show locked packages, or registry versions
//!     with `--all`.
//! -   **`search <term>...`**: search names and descriptions in the registry.
//! -   **`remove <name>...`**: drop roots and every package only they needed.
//! -   **`solve <file.cnf>`**: run the solver portfolio on a DIMACS file.
//! -   **`completions <shell>`**: print shell completions.
//!
//! Solver options (`--workers`, `--seed`, `--timeout-ms`, `--conflict-budget`,
//! `--restart-strategy`, `--variable-selection`, `--no-clause-management`)
//! and `--strict` apply to every command that solves.
//!
//! ## Exit codes
//!
//! `0` success, `1` no solution, `2` invalid input, `3` timeout.
//!
//! ## Example Invocations
//!
//! ```sh
//! # Install the newest compatible http client from a registry directory
//! satpm --registry ./registry install "http^1.0"
//!
//! # Show the plan and statistics without touching the lockfile
//! satpm install web "log>=1.0,<2.0" --dry-run --stats -v
//!
//! # Solve a CNF file with four workers and a two second limit
//! satpm solve problem.cnf --workers 4 --timeout-ms 2000
//! ```

use crate::command_line::cli::{
    Cli, Commands, completions, exit_code, install, list, remove, search, solve_dimacs,
};
use clap::Parser;
use std::process::ExitCode;

mod command_line;

/// Global allocator using `tikv-jemallocator` for performance and memory
/// usage tracking.
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let common = &cli.common;
    match cli.command {
        Commands::Install {
            specs,
            dry_run,
            export_dimacs,
        } => install(common, &specs, dry_run, export_dimacs.as_deref()),
        Commands::List { specs, all } => list(common, &specs, all),
        Commands::Search { terms, pre } => search(common, &terms, pre),
        Commands::Remove { names, dry_run } => remove(common, &names, dry_run),
        Commands::Solve { path, no_model } => solve_dimacs(common, &path, no_model),
        Commands::Completions { shell } => Ok(completions(shell)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::from(u8::try_from(exit_code(&e)).unwrap_or(1))
        }
    }
}
