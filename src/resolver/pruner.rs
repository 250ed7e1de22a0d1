#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Reduction of a satisfying assignment to the packages the roots need.
//!
//! A model may set versions true that nothing requires. Pruning keeps only
//! the versions reachable from the roots through dependency edges and
//! returns them in dependency order: every package comes after the packages
//! it depends on, except along cycles, where the member entered first comes
//! last.

use crate::resolver::error::ResolveError;
use crate::resolver::universe::{Dependency, PackageId, PackageName, Universe};
use bit_vec::BitVec;
use rustc_hash::FxHashMap;

/// Prunes `selected` to the versions reachable from `roots`.
///
/// Applying it to its own output returns the same sequence.
///
/// # Errors
///
/// `InternalInvariantViolation` if two versions of one package are selected,
/// a root has no selected match, or a kept package has a dependency without a
/// selected match.
pub fn prune(
    universe: &Universe,
    selected: &[PackageId],
    roots: &[Dependency],
) -> Result<Vec<PackageId>, ResolveError> {
    let mut chosen: FxHashMap<PackageName, PackageId> = FxHashMap::default();
    for &id in selected {
        let name = universe.get(id).name;
        if let Some(&previous) = chosen.get(&name) {
            if previous != id {
                return Err(violation(format!(
                    "two versions of {} selected: {} and {}",
                    universe.name(name),
                    universe.get(previous).version,
                    universe.get(id).version
                )));
            }
        }
        chosen.insert(name, id);
    }

    let resolve = |dependency: &Dependency| {
        chosen
            .get(&dependency.name)
            .copied()
            .filter(|&id| dependency.constraint.matches(&universe.get(id).version))
    };

    let mut visited = BitVec::from_elem(universe.len(), false);
    let mut order = Vec::new();
    let mut stack: Vec<(PackageId, usize)> = Vec::new();

    for root in roots {
        let start = resolve(root).ok_or_else(|| {
            violation(format!(
                "root {} {} has no selected version",
                universe.name(root.name),
                root.constraint
            ))
        })?;
        if visited[start.index()] {
            continue;
        }
        visited.set(start.index(), true);
        stack.push((start, 0));

        while let Some(top) = stack.last_mut() {
            let id = top.0;
            if let Some(dependency) = universe.get(id).dependencies.get(top.1) {
                top.1 += 1;
                let target = resolve(dependency).ok_or_else(|| {
                    violation(format!(
                        "{} depends on {} {} but no selected version matches",
                        universe.display(id),
                        universe.name(dependency.name),
                        dependency.constraint
                    ))
                })?;
                if !visited[target.index()] {
                    visited.set(target.index(), true);
                    stack.push((target, 0));
                }
            } else {
                stack.pop();
                order.push(id);
            }
        }
    }

    log::debug!(
        "pruned {} of {} selected versions",
        selected.len() - order.len().min(selected.len()),
        selected.len()
    );
    Ok(order)
}

fn violation(message: String) -> ResolveError {
    ResolveError::InternalInvariantViolation(message)
}
