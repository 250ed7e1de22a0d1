#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Package registries.
//!
//! The resolver only needs [`Registry::lookup`]. [`InMemoryRegistry`] is the
//! registry the command line tool uses: JSON manifests loaded from a single
//! file (an array of manifests or one manifest) or from every `*.json` file
//! below a directory.

use crate::resolver::constraint::VersionConstraint;
use crate::resolver::error::RegistryError;
use crate::resolver::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// One published version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, VersionConstraint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, VersionConstraint>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PackageManifest {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, constraint: VersionConstraint) -> Self {
        self.dependencies.insert(name.into(), constraint);
        self
    }

    #[must_use]
    pub fn with_conflict(mut self, name: impl Into<String>, constraint: VersionConstraint) -> Self {
        self.conflicts.insert(name.into(), constraint);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Source of package manifests.
pub trait Registry {
    /// Every known version of `name`. Empty if the package is unknown.
    ///
    /// # Errors
    ///
    /// If the registry cannot be read.
    fn lookup(&self, name: &str) -> Result<Vec<PackageManifest>, RegistryError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<PackageManifest>),
    One(PackageManifest),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryRegistry {
    /// Versions per package name, newest first.
    packages: BTreeMap<String, Vec<PackageManifest>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// If a manifest has an empty name.
    pub fn from_manifests<I: IntoIterator<Item = PackageManifest>>(
        manifests: I,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for manifest in manifests {
            registry.add(manifest)?;
        }
        Ok(registry)
    }

    /// Adds a manifest. Returns `false` if that version was already known, in
    /// which case the first manifest is kept.
    ///
    /// # Errors
    ///
    /// If the manifest has an empty name.
    pub fn add(&mut self, manifest: PackageManifest) -> Result<bool, RegistryError> {
        if manifest.name.trim().is_empty() {
            return Err(RegistryError::InvalidManifest {
                name: manifest.name,
                reason: "package name is empty".to_string(),
            });
        }
        let versions = self.packages.entry(manifest.name.clone()).or_default();
        match versions.binary_search_by(|m| manifest.version.cmp(&m.version)) {
            Ok(_) => {
                log::debug!("ignoring duplicate manifest {} {}", manifest.name, manifest.version);
                Ok(false)
            }
            Err(pos) => {
                versions.insert(pos, manifest);
                Ok(true)
            }
        }
    }

    /// Parses manifests from JSON text and adds them. Returns how many
    /// manifests the text contained.
    ///
    /// # Errors
    ///
    /// If the text is not a manifest or an array of manifests.
    pub fn add_json(&mut self, text: &str, source: &Path) -> Result<usize, RegistryError> {
        let parsed: OneOrMany =
            serde_json::from_str(text).map_err(|source_err| RegistryError::Json {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        let manifests = match parsed {
            OneOrMany::Many(many) => many,
            OneOrMany::One(one) => vec![one],
        };
        let count = manifests.len();
        for manifest in manifests {
            self.add(manifest)?;
        }
        Ok(count)
    }

    /// Loads a registry file, or every `*.json` file below a directory in
    /// file name order.
    ///
    /// # Errors
    ///
    /// If a file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| RegistryError::Io {
                    path: e.path().unwrap_or(path).to_path_buf(),
                    source: e.into(),
                })?;
                let file = entry.path();
                if file.is_file() && file.extension().is_some_and(|ext| ext == "json") {
                    registry.load_file(file)?;
                }
            }
        } else {
            registry.load_file(path)?;
        }
        log::info!(
            "loaded {} versions of {} packages from {}",
            registry.num_versions(),
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    fn load_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.add_json(&text, path)?;
        log::debug!("read {count} manifests from {}", path.display());
        Ok(count)
    }

    /// Number of package names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    #[must_use]
    pub fn num_versions(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    /// Package names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Versions of `name`, newest first.
    #[must_use]
    pub fn versions(&self, name: &str) -> &[PackageManifest] {
        self.packages.get(name).map_or(&[], Vec::as_slice)
    }

    /// Versions of `name` matching `constraint`, newest first.
    #[must_use]
    pub fn find(&self, name: &str, constraint: &VersionConstraint) -> Vec<&PackageManifest> {
        self.versions(name)
            .iter()
            .filter(|m| constraint.matches(&m.version))
            .collect()
    }

    /// Newest version of `name`, skipping pre-releases unless `include_pre`
    /// is set.
    #[must_use]
    pub fn latest(&self, name: &str, include_pre: bool) -> Option<&PackageManifest> {
        self.versions(name)
            .iter()
            .find(|m| include_pre || !m.version.is_prerelease())
    }

    /// Latest version of every package whose name or description contains
    /// `query`, case-insensitively.
    #[must_use]
    pub fn search(&self, query: &str, include_pre: bool) -> Vec<&PackageManifest> {
        let query = query.to_lowercase();
        self.packages
            .iter()
            .filter(|(name, versions)| {
                name.to_lowercase().contains(&query)
                    || versions
                        .iter()
                        .any(|m| m.description.to_lowercase().contains(&query))
            })
            .filter_map(|(name, _)| self.latest(name, include_pre))
            .collect()
    }
}

impl Registry for InMemoryRegistry {
    fn lookup(&self, name: &str) -> Result<Vec<PackageManifest>, RegistryError> {
        Ok(self.versions(name).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"[
        {"name": "http", "version": "1.0.0", "description": "HTTP client",
         "dependencies": {"tls": "^1.0"}},
        {"name": "http", "version": "2.0.0-beta.1", "description": "HTTP client"},
        {"name": "http", "version": "1.2.0", "description": "HTTP client"},
        {"name": "tls", "version": "1.0.0", "conflicts": {"openssl": "<3"}}
    ]"#;

    fn registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.add_json(REGISTRY, Path::new("inline")).unwrap();
        registry
    }

    #[test]
    fn test_versions_newest_first() {
        let registry = registry();
        let versions: Vec<String> = registry
            .versions("http")
            .iter()
            .map(|m| m.version.to_string())
            .collect();
        assert_eq!(versions, vec!["2.0.0-beta.1", "1.2.0", "1.0.0"]);
        assert_eq!(registry.num_versions(), 4);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["http", "tls"]);
    }

    #[test]
    fn test_manifest_fields() {
        let registry = registry();
        let found = registry.find("http", &"==1.0.0".parse().unwrap());
        let http = found[0];
        assert_eq!(http.dependencies["tls"], "^1.0".parse().unwrap());
        let tls = &registry.versions("tls")[0];
        assert_eq!(tls.conflicts["openssl"], "<3".parse().unwrap());
    }

    #[test]
    fn test_latest_and_search() {
        let registry = registry();
        assert_eq!(
            registry.latest("http", false).unwrap().version,
            Version::new(1, 2, 0)
        );
        assert!(registry.latest("http", true).unwrap().version.is_prerelease());

        let found = registry.search("CLIENT", false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "http");
        assert!(registry.search("nothing", true).is_empty());
    }

    #[test]
    fn test_duplicates_and_invalid() {
        let mut registry = registry();
        let dup = PackageManifest::new("tls", Version::new(1, 0, 0));
        assert!(!registry.add(dup).unwrap());
        assert!(registry.add(PackageManifest::new(" ", Version::new(1, 0, 0))).is_err());
        assert!(
            registry
                .add_json(r#"{"name": "x", "version": "one"}"#, Path::new("bad"))
                .is_err()
        );
    }

    #[test]
    fn test_single_object_and_lookup_unknown() {
        let mut registry = InMemoryRegistry::new();
        let count = registry
            .add_json(r#"{"name": "solo", "version": "0.1"}"#, Path::new("solo"))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.lookup("solo").unwrap().len(), 1);
        assert!(registry.lookup("missing").unwrap().is_empty());
    }
}
