#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The lockfile: root requirements and the resolved packages that satisfy
//! them, stored as pretty-printed JSON.

use crate::resolver::Requirement;
use crate::resolver::error::{LockfileError, ResolveError};
use crate::resolver::pruner::prune;
use crate::resolver::registry::{InMemoryRegistry, PackageManifest};
use crate::resolver::universe::Universe;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lockfile {
    pub roots: Vec<Requirement>,
    /// Locked packages, each after its dependencies.
    pub packages: Vec<PackageManifest>,
}

impl Lockfile {
    #[must_use]
    pub const fn new(roots: Vec<Requirement>, packages: Vec<PackageManifest>) -> Self {
        Self { roots, packages }
    }

    /// # Errors
    ///
    /// If the file cannot be read or is not a lockfile.
    pub fn load(path: &Path) -> Result<Self, LockfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| LockfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LockfileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Lockfile::load`], but a missing file is an empty lockfile.
    ///
    /// # Errors
    ///
    /// If the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, LockfileError> {
        match Self::load(path) {
            Err(LockfileError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                log::debug!("no lockfile at {}, starting empty", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// # Errors
    ///
    /// If the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| LockfileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json + "\n").map_err(|source| LockfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "wrote {} packages to {}",
            self.packages.len(),
            path.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PackageManifest> {
        self.packages.iter().find(|m| m.name == name)
    }

    /// The roots after adding `new`. A new requirement replaces an existing
    /// root on the same package.
    #[must_use]
    pub fn merge_roots(&self, new: &[Requirement]) -> Vec<Requirement> {
        let mut roots = self.roots.clone();
        for requirement in new {
            if let Some(existing) = roots.iter_mut().find(|r| r.name == requirement.name) {
                existing.clone_from(requirement);
            } else {
                roots.push(requirement.clone());
            }
        }
        roots
    }

    /// Drops the roots named in `names` and prunes the locked packages to
    /// those the remaining roots still reach. Returns the new lockfile and
    /// the packages that were dropped.
    ///
    /// # Errors
    ///
    /// `NotInstalled` if a name is not a root, or an invariant violation if
    /// the locked packages do not satisfy the remaining roots.
    pub fn remove(&self, names: &[String]) -> Result<(Self, Vec<PackageManifest>), ResolveError> {
        if let Some(missing) = names.iter().find(|n| !self.roots.iter().any(|r| &r.name == *n)) {
            return Err(LockfileError::NotInstalled(missing.clone()).into());
        }
        let roots: Vec<Requirement> = self
            .roots
            .iter()
            .filter(|r| !names.contains(&r.name))
            .cloned()
            .collect();

        let kept = if roots.is_empty() {
            Vec::new()
        } else {
            let registry = InMemoryRegistry::from_manifests(self.packages.iter().cloned())?;
            let universe = Universe::build(&registry, &roots)?;
            let locked: Vec<_> = universe.ids().collect();
            let order = prune(&universe, &locked, &universe.root_dependencies(&roots))?;
            order.into_iter().map(|id| universe.manifest(id)).collect()
        };

        let removed = self
            .packages
            .iter()
            .filter(|m| !kept.iter().any(|k: &PackageManifest| k.name == m.name))
            .cloned()
            .collect();
        Ok((Self::new(roots, kept), removed))
    }
}
