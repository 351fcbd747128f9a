//! Splitting locked packages into compatible and incompatible sets for a
//! target environment.

use std::collections::HashSet;

use wheelhouse_core::{LockedPackage, Lockfile, PackageName, TargetEnvironment};
use wheelhouse_util::errors::{WheelhouseError, WheelhouseResult};

use crate::marker::eval_marker;
use crate::version::is_compatible;

/// The result of partitioning a lock against a target environment.
///
/// Both buckets preserve lock-file order, which keeps downstream overlay
/// evaluation deterministic. Together they are a total, disjoint split of
/// the lock.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub compatible: Vec<LockedPackage>,
    /// Entries that do not apply to the target. Recorded explicitly (not
    /// silently dropped) so the composer can actively null them out.
    pub incompatible: Vec<LockedPackage>,
}

impl Partition {
    pub fn compatible_names(&self) -> Vec<PackageName> {
        self.compatible.iter().map(LockedPackage::canonical_name).collect()
    }

    pub fn incompatible_names(&self) -> Vec<PackageName> {
        self.incompatible.iter().map(LockedPackage::canonical_name).collect()
    }
}

/// Partition the lock's entries by applicability to `env`.
///
/// A package is kept only if every constraint it declares holds; an absent
/// constraint is treated as always-true for that axis. Two entries with
/// the same canonical name indicate a corrupt lock.
pub fn partition(lock: &Lockfile, env: &TargetEnvironment) -> WheelhouseResult<Partition> {
    let mut seen: HashSet<PackageName> = HashSet::new();
    let mut result = Partition::default();

    for pkg in &lock.package {
        let name = pkg.canonical_name();
        if !seen.insert(name.clone()) {
            return Err(WheelhouseError::DuplicateDefinition {
                name: name.to_string(),
            });
        }

        if applies(pkg, env)? {
            result.compatible.push(pkg.clone());
        } else {
            tracing::debug!(package = %name, "filtered out: not applicable to target");
            result.incompatible.push(pkg.clone());
        }
    }

    tracing::debug!(
        compatible = result.compatible.len(),
        incompatible = result.incompatible.len(),
        "partitioned lock"
    );
    Ok(result)
}

fn applies(pkg: &LockedPackage, env: &TargetEnvironment) -> WheelhouseResult<bool> {
    if let Some(marker) = &pkg.marker {
        if !eval_marker(marker, env)? {
            return Ok(false);
        }
    }
    if let Some(range) = &pkg.python_versions {
        if !is_compatible(&env.python_version, range)? {
            return Ok(false);
        }
    }
    Ok(true)
}
