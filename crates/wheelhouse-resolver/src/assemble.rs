//! Assembly of the final installable outputs from a resolved closure.
//!
//! Pure selection and tagging: nothing here mutates the resolved set.

use std::collections::BTreeMap;

use wheelhouse_core::{license, Manifest, PackageDefinition, PackageName};

use crate::closure::Closure;
use crate::overlay::ResolvedSet;

/// Project metadata passed through to the build executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// License short code resolved to an SPDX identifier where the table
    /// knows it, otherwise passed through verbatim.
    pub license: Option<String>,
    pub homepage: Option<String>,
}

/// The assembled environment: everything a build executor needs to
/// materialize the requested closure.
#[derive(Debug)]
pub struct EnvironmentSet {
    pub project: ProjectInfo,
    /// Installable package definitions, in closure discovery order.
    pub packages: Vec<PackageDefinition>,
    /// Synthetic entry-point-scripts package; present only when the
    /// manifest declares scripts.
    pub scripts: Option<PackageDefinition>,
    /// Synthetic editable-source package; present only when the caller
    /// supplied editable mappings.
    pub editable: Option<PackageDefinition>,
    /// Caller-supplied extra build attributes, passed through untouched.
    pub attrs: BTreeMap<String, serde_json::Value>,
}

/// Select and tag the closure's members into an [`EnvironmentSet`].
pub fn assemble(
    manifest: &Manifest,
    resolved: &ResolvedSet,
    closure: &Closure,
    editable: &BTreeMap<PackageName, String>,
    extra_attrs: &BTreeMap<String, serde_json::Value>,
) -> EnvironmentSet {
    let mut packages = Vec::with_capacity(closure.len());
    for name in closure.names() {
        if let Some(def) = resolved.get(name) {
            packages.push(def.clone());
        }
    }

    let project = &manifest.project;
    EnvironmentSet {
        project: ProjectInfo {
            name: project.name.clone(),
            version: project.version.clone(),
            description: project.description.clone(),
            license: project.license.as_deref().map(license::resolve),
            homepage: project.homepage.clone(),
        },
        scripts: scripts_package(manifest),
        editable: editable_package(manifest, editable),
        packages,
        attrs: extra_attrs.clone(),
    }
}

/// A synthetic package carrying the manifest's entry-point scripts.
fn scripts_package(manifest: &Manifest) -> Option<PackageDefinition> {
    if manifest.scripts.is_empty() {
        return None;
    }
    let name = PackageName::new(&format!("{}-scripts", manifest.project.name));
    let mut def = PackageDefinition::synthetic(name, &manifest.project.version);
    def.attrs.insert(
        "entry-points".into(),
        serde_json::to_value(&manifest.scripts).unwrap_or_default(),
    );
    // Scripts need the project's runtime dependencies on the path.
    def.propagated = manifest.direct_names();
    Some(def)
}

/// A synthetic package describing in-place source overrides.
fn editable_package(
    manifest: &Manifest,
    editable: &BTreeMap<PackageName, String>,
) -> Option<PackageDefinition> {
    if editable.is_empty() {
        return None;
    }
    let name = PackageName::new(&format!("{}-editable", manifest.project.name));
    let mut def = PackageDefinition::synthetic(name, &manifest.project.version);
    let sources: BTreeMap<String, String> = editable
        .iter()
        .map(|(n, path)| (n.to_string(), path.clone()))
        .collect();
    def.attrs.insert(
        "editable-sources".into(),
        serde_json::to_value(sources).unwrap_or_default(),
    );
    Some(def)
}
