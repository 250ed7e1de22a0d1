#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Error types of the resolver, one enum per layer.

use crate::resolver::constraint::VersionConstraint;
use crate::resolver::encoder::Explanation;
use crate::sat::solver::TimeoutReason;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Malformed version, constraint or package spec text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version \"{0}\"")]
    InvalidVersion(String),

    #[error("invalid version constraint \"{constraint}\": {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("invalid package spec \"{0}\"")]
    InvalidRequirement(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid manifest for \"{name}\": {reason}")]
    InvalidManifest { name: String, reason: String },
}

/// A requirement that cannot be turned into clauses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("unknown package \"{0}\"")]
    UnknownPackage(String),

    #[error("no version of {name} matches {constraint}")]
    NoMatchingVersion {
        name: String,
        constraint: VersionConstraint,
    },

    #[error("no version of {dependency} matches {constraint}, required by {dependent}")]
    MissingDependency {
        dependent: String,
        dependency: String,
        constraint: VersionConstraint,
    },
}

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("failed to access lockfile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed lockfile {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("\"{0}\" is not a root requirement of the lockfile")]
    NotInstalled(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    #[error("{0}")]
    Unsatisfiable(Explanation),

    #[error("no answer within budget: {reason} after {conflicts} conflicts in {elapsed:.2?}")]
    Timeout {
        reason: TimeoutReason,
        conflicts: usize,
        elapsed: Duration,
    },

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

impl ResolveError {
    /// Process exit code: `1` resolution failure, `2` invalid input,
    /// `3` timeout.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Version(_)
            | Self::Registry(_)
            | Self::Lockfile(_)
            | Self::Encoding(
                EncodingError::UnknownPackage(_) | EncodingError::NoMatchingVersion { .. },
            ) => 2,
            Self::Encoding(EncodingError::MissingDependency { .. })
            | Self::Unsatisfiable(_)
            | Self::InternalInvariantViolation(_) => 1,
            Self::Timeout { .. } => 3,
        }
    }

    /// Timeouts may succeed with a larger budget; nothing else will.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
