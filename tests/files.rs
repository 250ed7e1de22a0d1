use satpm::resolver::config::ResolverConfig;
use satpm::resolver::error::RegistryError;
use satpm::resolver::lockfile::Lockfile;
use satpm::resolver::registry::{InMemoryRegistry, Registry};
use satpm::resolver::{Requirement, Resolver};
use satpm::sat::cdcl::Cdcl;
use satpm::sat::cnf::Cnf;
use satpm::sat::dimacs::{parse_dimacs, parse_file};
use satpm::sat::solver::{SolveOutcome, Solver};
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

const CORE: &str = r#"[
    {"name": "log", "version": "1.0.0"},
    {"name": "log", "version": "1.4.0", "description": "Structured logging"},
    {"name": "json", "version": "0.9.0", "dependencies": {"log": "^1.0"}}
]"#;

const WEB: &str = r#"{
    "name": "web", "version": "2.1.0", "description": "Web framework",
    "dependencies": {"json": "~0.9", "log": ">=1.2"}
}"#;

const CLI: &str = r#"{"name": "args", "version": "3.0.0", "dependencies": {"log": "*"}}"#;

fn requirements(specs: &[&str]) -> Vec<Requirement> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

#[test]
fn test_registry_directory_is_walked_recursively() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("core.json"), CORE).unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("web.json"), WEB).unwrap();
    fs::write(dir.path().join("nested").join("README.md"), "not a manifest").unwrap();

    let registry = InMemoryRegistry::load(dir.path()).unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.num_versions(), 4);
    assert_eq!(registry.lookup("web").unwrap()[0].dependencies.len(), 2);
    assert_eq!(registry.search("logging", false)[0].name, "log");
}

#[test]
fn test_registry_errors_name_the_file() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("bad.json");
    fs::write(&bad, "[{\"name\": \"x\"}]").unwrap();
    let err = InMemoryRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(&err, RegistryError::Json { path, .. } if path == &bad));

    let missing = InMemoryRegistry::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, RegistryError::Io { .. }));
}

#[test]
fn test_install_then_remove_round_trip() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");
    fs::write(
        &registry_path,
        format!(
            "[{}, {}, {}]",
            &CORE[1..CORE.len() - 1],
            WEB,
            CLI
        ),
    )
    .unwrap();
    let lock_path = dir.path().join("satpm.lock");

    let registry = InMemoryRegistry::load(&registry_path).unwrap();
    let resolver = Resolver::new(&registry, ResolverConfig::default().with_workers(2));

    let lockfile = Lockfile::load_or_default(&lock_path).unwrap();
    let roots = lockfile.merge_roots(&requirements(&["web", "args"]));
    let resolution = resolver.resolve(&roots).unwrap();
    Lockfile::new(roots.clone(), resolution.packages.clone())
        .save(&lock_path)
        .unwrap();

    let locked = Lockfile::load(&lock_path).unwrap();
    assert_eq!(locked.roots, roots);
    assert_eq!(locked.packages, resolution.packages);
    assert_eq!(locked.find("log").unwrap().version, "1.4.0".parse().unwrap());

    let (after, removed) = locked.remove(&["web".to_string()]).unwrap();
    let removed: Vec<&str> = removed.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(removed, vec!["json", "web"]);
    let kept: Vec<&str> = after.packages.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(kept, vec!["log", "args"]);
    after.save(&lock_path).unwrap();
    assert_eq!(Lockfile::load(&lock_path).unwrap(), after);

    let again = resolver.resolve(&after.roots).unwrap();
    assert!(again.find("args").is_some());
}

#[test]
fn test_dimacs_export_round_trip() {
    let registry = InMemoryRegistry::from_manifests(
        serde_json::from_str::<Vec<_>>(CORE).unwrap(),
    )
    .unwrap();
    let resolver = Resolver::new(&registry, ResolverConfig::default());
    let (_, encoding) = resolver.encode(&requirements(&["json"])).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("json.cnf");
    fs::write(&path, encoding.cnf.to_string()).unwrap();
    let parsed = parse_file(&path).unwrap();
    assert_eq!(parsed.num_vars, encoding.cnf.num_vars);
    assert_eq!(parsed.len(), encoding.cnf.len());

    let mut solver: Cdcl = Cdcl::new(parsed);
    let SolveOutcome::Sat(model) = solver.solve() else {
        panic!("encoding of a satisfiable request");
    };
    assert!(encoding.cnf.verify(&model));
}

#[test]
fn test_dimacs_unsat_file() {
    let text = "c contradiction\np cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n";
    let cnf: Cnf = parse_dimacs(Cursor::new(text)).unwrap();
    let mut solver: Cdcl = Cdcl::new(cnf);
    let SolveOutcome::Unsat(refutation) = solver.solve() else {
        panic!("every assignment is excluded");
    };
    assert_eq!(refutation.core, vec![0, 1, 2, 3]);
}
