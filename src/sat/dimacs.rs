#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A parser for the DIMACS CNF file format.
//!
//! Comment lines start with `c`, the problem line `p cnf <vars> <clauses>`
//! declares the variable count, and every clause is a run of signed
//! integers terminated by `0`. Clauses may span lines. A `%` line ends the
//! data, as in some competition files.

use crate::sat::cnf::Cnf;
use crate::sat::literal::Literal;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DimacsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: invalid literal `{token}`")]
    InvalidLiteral { line: usize, token: String },
    #[error("line {line}: malformed problem line")]
    InvalidHeader { line: usize },
}

/// Parses DIMACS data from a reader.
///
/// # Errors
///
/// On read failures, malformed problem lines and non-integer literals.
pub fn parse_dimacs<R: BufRead>(reader: R) -> Result<Cnf, DimacsError> {
    let mut cnf = Cnf::default();
    let mut declared_vars = 0;
    let mut current: Vec<Literal> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DimacsError::Io {
            path: PathBuf::from("<input>"),
            source,
        })?;
        let mut parts = line.split_whitespace().peekable();

        match parts.peek() {
            Some(&"%") => break,
            None | Some(&"c") => {}
            Some(&"p") => {
                let fields: Vec<&str> = parts.collect();
                if fields.len() != 4 || fields[1] != "cnf" {
                    return Err(DimacsError::InvalidHeader { line: i + 1 });
                }
                declared_vars = fields[2]
                    .parse::<usize>()
                    .map_err(|_| DimacsError::InvalidHeader { line: i + 1 })?;
            }
            Some(_) => {
                for token in parts {
                    let value = token.parse::<i32>().map_err(|_| DimacsError::InvalidLiteral {
                        line: i + 1,
                        token: token.to_string(),
                    })?;
                    if value == 0 {
                        cnf.add_clause(current.drain(..));
                    } else {
                        current.push(Literal::from_i32(value));
                    }
                }
            }
        }
    }

    if !current.is_empty() {
        cnf.add_clause(current);
    }
    cnf.num_vars = cnf.num_vars.max(declared_vars);
    Ok(cnf)
}

/// Parses a DIMACS file.
///
/// # Errors
///
/// If the file cannot be opened, or see [`parse_dimacs`].
pub fn parse_file(path: &Path) -> Result<Cnf, DimacsError> {
    let file = std::fs::File::open(path).map_err(|source| DimacsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dimacs(io::BufReader::new(file))
}
