#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Version constraints: predicates over [`Version`].
//!
//! Accepted syntax: `*`, `==1.2.3` (or a bare `1.2.3`), `!=`, `>`, `>=`, `<`,
//! `<=`, caret `^2.0.0` (`>=2.0.0,<3.0.0`), tilde `~1.2.3` (`>=1.2.3,<1.3.0`),
//! and comma-separated intersections such as `>=1.0,<2.0`.

use crate::resolver::error::VersionError;
use crate::resolver::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    #[default]
    Any,
    Exact(Version),
    NotEqual(Version),
    Greater(Version),
    GreaterEq(Version),
    Less(Version),
    LessEq(Version),
    Caret(Version),
    Tilde(Version),
    /// Satisfied when every member is.
    All(Vec<VersionConstraint>),
}

/// Longest operators first so that `>=` is not read as `>`.
const OPERATORS: [&str; 9] = ["==", "!=", ">=", "<=", ">", "<", "^", "~", "="];

/// `candidate < upper`, except that pre-releases of `upper` itself do not
/// count as below it: `^1.0.0` must not admit `2.0.0-alpha`.
fn below_bound(candidate: &Version, upper: &Version) -> bool {
    candidate < upper && !(candidate.is_prerelease() && candidate.same_release(upper))
}

impl VersionConstraint {
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => version == v,
            Self::NotEqual(v) => version != v,
            Self::Greater(v) => version > v,
            Self::GreaterEq(v) => version >= v,
            Self::Less(v) => version < v,
            Self::LessEq(v) => version <= v,
            Self::Caret(v) => version >= v && below_upper(version, caret_upper(v)),
            Self::Tilde(v) => version >= v && below_upper(version, tilde_upper(v)),
            Self::All(members) => members.iter().all(|c| c.matches(version)),
        }
    }

    /// The conjunction of both constraints, flattened.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let mut members = Vec::new();
        for c in [self, other] {
            match c {
                Self::Any => {}
                Self::All(inner) => members.extend(inner),
                c => members.push(c),
            }
        }
        members.dedup();
        match members.len() {
            0 => Self::Any,
            1 => members.pop().unwrap_or_default(),
            _ => Self::All(members),
        }
    }

    fn parse_single(text: &str, whole: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Ok(Self::Any);
        }

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|op| text.strip_prefix(op).map(|rest| (*op, rest)))
            .unwrap_or(("==", text));

        let version: Version = rest.parse().map_err(|_| VersionError::InvalidConstraint {
            constraint: whole.to_string(),
            reason: format!("\"{}\" is not a version", rest.trim()),
        })?;

        Ok(match op {
            "==" | "=" => Self::Exact(version),
            "!=" => Self::NotEqual(version),
            ">=" => Self::GreaterEq(version),
            "<=" => Self::LessEq(version),
            ">" => Self::Greater(version),
            "<" => Self::Less(version),
            "^" => Self::Caret(version),
            _ => Self::Tilde(version),
        })
    }
}

/// A missing upper bound (the bumped component overflowed) admits everything.
fn below_upper(candidate: &Version, upper: Option<Version>) -> bool {
    upper.is_none_or(|upper| below_bound(candidate, &upper))
}

/// Bumps the first non-zero component; `^0.0.0` admits only `0.0.0`.
fn caret_upper(v: &Version) -> Option<Version> {
    if v.major > 0 {
        Some(Version::new(v.major.checked_add(1)?, 0, 0))
    } else if v.minor > 0 {
        Some(Version::new(0, v.minor.checked_add(1)?, 0))
    } else {
        Some(Version::new(0, 0, v.patch.checked_add(1)?))
    }
}

fn tilde_upper(v: &Version) -> Option<Version> {
    Some(Version::new(v.major, v.minor.checked_add(1)?, 0))
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(',') {
            return Self::parse_single(s, s);
        }
        s.split(',').try_fold(Self::Any, |acc, part| {
            if part.trim().is_empty() {
                return Err(VersionError::InvalidConstraint {
                    constraint: s.to_string(),
                    reason: "empty member".to_string(),
                });
            }
            Ok(acc.intersect(Self::parse_single(part, s)?))
        })
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionConstraint> for String {
    fn from(value: VersionConstraint) -> Self {
        value.to_string()
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "=={v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::GreaterEq(v) => write!(f, ">={v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::LessEq(v) => write!(f, "<={v}"),
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~{v}"),
            Self::All(members) => {
                for (i, c) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}
