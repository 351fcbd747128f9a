use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::name::PackageName;

/// The parsed representation of a project manifest.
///
/// The surrounding layer deserializes the on-disk document into this
/// structure; the engine treats it as an immutable snapshot for the
/// duration of one resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectMetadata,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    #[serde(default, rename = "dev-dependencies")]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,

    /// Entry-point scripts: script name to `module:function` target.
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,

    #[serde(default, rename = "build-system")]
    pub build_system: Option<BuildSystem>,
}

/// Project identity and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// License short code (e.g. `mit`, `bsd3`); resolved to an SPDX
    /// identifier at assembly time.
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

/// A dependency specification in the manifest.
///
/// Supports both the shorthand constraint string (`"^1.2"`) and the
/// detailed form with marker and python-version sub-constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Constraint(String),
    Detailed(DetailedDependency),
}

/// A dependency with an explicit version constraint and optional
/// environment gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedDependency {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub markers: Option<String>,
    #[serde(default)]
    pub python: Option<String>,
}

/// Build backend requirements from the `[build-system]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSystem {
    #[serde(default)]
    pub requires: Vec<String>,
}

impl DependencySpec {
    /// The version-constraint string, if one is declared.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Constraint(v) => Some(v),
            Self::Detailed(d) => d.version.as_deref(),
        }
    }

    /// The environment-marker expression, if one is declared.
    pub fn markers(&self) -> Option<&str> {
        match self {
            Self::Constraint(_) => None,
            Self::Detailed(d) => d.markers.as_deref(),
        }
    }

    /// The supported-python-version range, if one is declared.
    pub fn python(&self) -> Option<&str> {
        match self {
            Self::Constraint(_) => None,
            Self::Detailed(d) => d.python.as_deref(),
        }
    }
}

impl Manifest {
    /// Canonical names of the direct runtime dependencies.
    pub fn direct_names(&self) -> Vec<PackageName> {
        self.dependencies.keys().map(|n| PackageName::new(n)).collect()
    }

    /// Canonical names of the dev (check/test) dependencies.
    pub fn dev_names(&self) -> Vec<PackageName> {
        self.dev_dependencies.keys().map(|n| PackageName::new(n)).collect()
    }

    /// Canonical names of the build-system requirements.
    ///
    /// Each entry in `requires` is a requirement string whose name part
    /// ends at the first constraint character.
    pub fn build_requirement_names(&self) -> Vec<PackageName> {
        let Some(bs) = &self.build_system else {
            return Vec::new();
        };
        bs.requires
            .iter()
            .map(|req| {
                let name_end = req
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
                    .unwrap_or(req.len());
                PackageName::new(&req[..name_end])
            })
            .collect()
    }
}
