use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lockfile::{FileHash, PackageSource};
use crate::name::PackageName;

/// A fully resolved package definition: everything a build executor needs
/// to materialize one package.
///
/// Definitions are produced by the overlay composer and never edited
/// outside it; downstream stages only select and tag them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDefinition {
    pub name: PackageName,
    pub version: String,
    pub source: PackageSource,
    /// Pinned artifact files and hashes, carried through from the lock.
    #[serde(default)]
    pub files: Vec<FileHash>,
    /// Build-time inputs (names of packages needed to build this one).
    #[serde(default)]
    pub build_inputs: Vec<PackageName>,
    /// Runtime dependencies propagated to consumers; the closure builder
    /// walks these edges.
    #[serde(default)]
    pub propagated: Vec<PackageName>,
    /// Check/test-only dependencies.
    #[serde(default)]
    pub check_inputs: Vec<PackageName>,
    /// Free-form extra build attributes, passed through to the executor.
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
    /// True for packages injected by an override layer rather than seeded
    /// from the lock (e.g. build-system packages, generated scripts).
    #[serde(default)]
    pub synthetic: bool,
}

impl PackageDefinition {
    /// A bare definition with the given identity and source, no edges.
    pub fn new(name: PackageName, version: impl Into<String>, source: PackageSource) -> Self {
        Self {
            name,
            version: version.into(),
            source,
            files: Vec::new(),
            build_inputs: Vec::new(),
            propagated: Vec::new(),
            check_inputs: Vec::new(),
            attrs: BTreeMap::new(),
            synthetic: false,
        }
    }

    /// A definition for a package that exists only by injection, with no
    /// locked artifacts behind it.
    pub fn synthetic(name: PackageName, version: impl Into<String>) -> Self {
        let mut def = Self::new(name, version, PackageSource::default());
        def.synthetic = true;
        def
    }
}
