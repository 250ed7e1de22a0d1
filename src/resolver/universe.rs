#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The candidate universe: every package version reachable from the root
//! requirements, stored in a dense arena.

use crate::resolver::constraint::VersionConstraint;
use crate::resolver::error::{EncodingError, ResolveError};
use crate::resolver::registry::{PackageManifest, Registry};
use crate::resolver::version::Version;
use crate::resolver::Requirement;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// Interned package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(pub u32);

/// Index of a package version in the universe arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub u32);

impl PackageId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A constraint on another package, used for dependencies, conflicts and
/// root requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub name: PackageName,
    pub constraint: VersionConstraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub name: PackageName,
    pub version: Version,
    pub dependencies: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct Universe {
    names: Vec<String>,
    name_index: FxHashMap<String, PackageName>,
    packages: Vec<PackageVersion>,
    /// Versions per name, newest first.
    by_name: Vec<Vec<PackageId>>,
}

impl Universe {
    /// Expands `roots` transitively through dependency edges, looking every
    /// reached package up once.
    ///
    /// Dependencies on unknown packages are kept as edges with no candidate.
    /// Conflicts name packages without pulling them in.
    ///
    /// # Errors
    ///
    /// A registry failure, or a root naming an unknown package.
    pub fn build<R: Registry + ?Sized>(
        registry: &R,
        roots: &[Requirement],
    ) -> Result<Self, ResolveError> {
        let mut universe = Self::default();
        let mut queue: VecDeque<PackageName> = VecDeque::new();
        let mut expanded: Vec<bool> = Vec::new();

        for root in roots {
            let name = universe.intern(&root.name);
            if registry.lookup(&root.name)?.is_empty() {
                return Err(EncodingError::UnknownPackage(root.name.clone()).into());
            }
            queue.push_back(name);
        }

        while let Some(name) = queue.pop_front() {
            if expanded.len() <= name.0 as usize {
                expanded.resize(name.0 as usize + 1, false);
            }
            if expanded[name.0 as usize] {
                continue;
            }
            expanded[name.0 as usize] = true;

            let manifests = registry.lookup(universe.name(name))?;
            for manifest in manifests {
                for dep in manifest.dependencies.keys() {
                    queue.push_back(universe.intern(dep));
                }
                universe.insert(manifest);
            }
        }

        for versions in &mut universe.by_name {
            let packages = &universe.packages;
            versions.sort_by(|a, b| packages[b.index()].version.cmp(&packages[a.index()].version));
        }

        log::debug!(
            "universe holds {} versions of {} packages",
            universe.len(),
            universe.num_names()
        );
        Ok(universe)
    }

    fn intern(&mut self, name: &str) -> PackageName {
        if let Some(&id) = self.name_index.get(name) {
            return id;
        }
        let id = PackageName(u32::try_from(self.names.len()).unwrap_or(u32::MAX));
        self.names.push(name.to_string());
        self.name_index.insert(name.to_string(), id);
        self.by_name.push(Vec::new());
        id
    }

    fn insert(&mut self, manifest: PackageManifest) {
        let name = self.intern(&manifest.name);
        let dependencies = manifest
            .dependencies
            .into_iter()
            .map(|(dep, constraint)| Dependency {
                name: self.intern(&dep),
                constraint,
            })
            .collect();
        let conflicts = manifest
            .conflicts
            .into_iter()
            .map(|(other, constraint)| Dependency {
                name: self.intern(&other),
                constraint,
            })
            .collect();

        let id = PackageId(u32::try_from(self.packages.len()).unwrap_or(u32::MAX));
        self.packages.push(PackageVersion {
            name,
            version: manifest.version,
            dependencies,
            conflicts,
            description: manifest.description,
        });
        self.by_name[name.0 as usize].push(id);
    }

    /// Number of package versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Number of interned names, including names with no versions.
    #[must_use]
    pub fn num_names(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn name(&self, name: PackageName) -> &str {
        &self.names[name.0 as usize]
    }

    #[must_use]
    pub fn lookup_name(&self, name: &str) -> Option<PackageName> {
        self.name_index.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, id: PackageId) -> &PackageVersion {
        &self.packages[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = PackageId> {
        (0..self.packages.len()).map(|i| PackageId(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    pub fn names(&self) -> impl Iterator<Item = PackageName> {
        (0..self.names.len()).map(|i| PackageName(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    /// Versions of `name`, newest first.
    #[must_use]
    pub fn versions_of(&self, name: PackageName) -> &[PackageId] {
        &self.by_name[name.0 as usize]
    }

    /// Versions of `name` matching `constraint`, newest first.
    #[must_use]
    pub fn matching(&self, name: PackageName, constraint: &VersionConstraint) -> Vec<PackageId> {
        self.versions_of(name)
            .iter()
            .copied()
            .filter(|&id| constraint.matches(&self.get(id).version))
            .collect()
    }

    /// `roots` with interned names.
    #[must_use]
    pub fn root_dependencies(&self, roots: &[Requirement]) -> Vec<Dependency> {
        roots
            .iter()
            .filter_map(|r| {
                self.lookup_name(&r.name).map(|name| Dependency {
                    name,
                    constraint: r.constraint.clone(),
                })
            })
            .collect()
    }

    /// The manifest `id` was built from.
    #[must_use]
    pub fn manifest(&self, id: PackageId) -> PackageManifest {
        let package = self.get(id);
        let mut manifest = PackageManifest::new(self.name(package.name), package.version.clone())
            .with_description(package.description.clone());
        for dep in &package.dependencies {
            manifest = manifest.with_dependency(self.name(dep.name), dep.constraint.clone());
        }
        for conflict in &package.conflicts {
            manifest = manifest.with_conflict(self.name(conflict.name), conflict.constraint.clone());
        }
        manifest
    }

    /// `name version`, for messages.
    #[must_use]
    pub fn display(&self, id: PackageId) -> PackageDisplay<'_> {
        PackageDisplay { universe: self, id }
    }
}

pub struct PackageDisplay<'a> {
    universe: &'a Universe,
    id: PackageId,
}

impl Display for PackageDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let package = self.universe.get(self.id);
        write!(f, "{} {}", self.universe.name(package.name), package.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::registry::InMemoryRegistry;

    fn manifest(name: &str, version: &str) -> PackageManifest {
        PackageManifest::new(name, version.parse().unwrap())
    }

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::from_manifests([
            manifest("app", "1.0").with_dependency("lib", ">=1.0".parse().unwrap()),
            manifest("lib", "1.0"),
            manifest("lib", "2.0").with_dependency("ghost", "*".parse().unwrap()),
            manifest("other", "1.0"),
            manifest("tool", "1.0").with_conflict("other", "*".parse().unwrap()),
        ])
        .unwrap()
    }

    fn req(text: &str) -> Requirement {
        text.parse().unwrap()
    }

    #[test]
    fn test_build_reaches_dependencies_only() {
        let universe = Universe::build(&registry(), &[req("app")]).unwrap();
        assert_eq!(universe.len(), 3);
        assert!(universe.lookup_name("other").is_none());

        let lib = universe.lookup_name("lib").unwrap();
        let versions: Vec<String> = universe
            .versions_of(lib)
            .iter()
            .map(|&id| universe.get(id).version.to_string())
            .collect();
        assert_eq!(versions, vec!["2.0.0", "1.0.0"]);

        let ghost = universe.lookup_name("ghost").unwrap();
        assert!(universe.versions_of(ghost).is_empty());
    }

    #[test]
    fn test_conflict_names_are_not_expanded() {
        let universe = Universe::build(&registry(), &[req("tool")]).unwrap();
        assert_eq!(universe.len(), 1);
        let other = universe.lookup_name("other").unwrap();
        assert!(universe.versions_of(other).is_empty());
    }

    #[test]
    fn test_unknown_root() {
        let err = Universe::build(&registry(), &[req("nope")]).unwrap_err();
        assert!(matches!(
            &err,
            ResolveError::Encoding(EncodingError::UnknownPackage(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_matching_and_manifest() {
        let universe = Universe::build(&registry(), &[req("app")]).unwrap();
        let lib = universe.lookup_name("lib").unwrap();
        let matches = universe.matching(lib, &"<2".parse().unwrap());
        assert_eq!(matches.len(), 1);
        assert_eq!(universe.display(matches[0]).to_string(), "lib 1.0.0");

        let app = universe.versions_of(universe.lookup_name("app").unwrap())[0];
        assert_eq!(universe.manifest(app), registry().versions("app")[0]);
    }
}
