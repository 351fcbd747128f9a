use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::name::PackageName;

/// Deterministic lock file recording every resolved package, its exact
/// version, source, applicability constraints, and artifact hashes.
///
/// The lock is assumed already solved upstream; the engine only interprets
/// and filters it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub package: Vec<LockedPackage>,
}

/// A single locked package entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub source: PackageSource,
    /// Environment-marker expression gating this entry, if any.
    #[serde(default)]
    pub marker: Option<String>,
    /// Supported interpreter version range, if any.
    #[serde(default, rename = "python-versions")]
    pub python_versions: Option<String>,
    /// Per-platform artifact records.
    #[serde(default)]
    pub files: Vec<FileHash>,
    #[serde(default)]
    pub category: Category,
    /// Dependencies this package propagates at runtime.
    #[serde(default)]
    pub dependencies: BTreeMap<String, LockedDependency>,
}

/// Where a locked package's artifacts come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PackageSource {
    Registry {
        #[serde(default)]
        index: Option<String>,
    },
    Url {
        url: String,
    },
    Git {
        url: String,
        rev: String,
    },
    Path {
        path: String,
    },
}

impl Default for PackageSource {
    fn default() -> Self {
        Self::Registry { index: None }
    }
}

/// An artifact file name and its content hash, as pinned by the lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileHash {
    pub file: String,
    pub hash: String,
}

/// Which dependency group a locked entry belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Main,
    Dev,
}

/// A propagated-dependency edge within a locked entry.
///
/// Either a bare version constraint or a detailed form with its own
/// marker (common with optional/extra-driven dependencies).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LockedDependency {
    Constraint(String),
    Detailed {
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        markers: Option<String>,
    },
}

impl LockedDependency {
    /// The marker gating this edge, if any.
    pub fn markers(&self) -> Option<&str> {
        match self {
            Self::Constraint(_) => None,
            Self::Detailed { markers, .. } => markers.as_deref(),
        }
    }
}

impl LockedPackage {
    /// The canonical name this entry is keyed by.
    pub fn canonical_name(&self) -> PackageName {
        PackageName::new(&self.name)
    }
}
