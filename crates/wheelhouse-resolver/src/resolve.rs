//! The resolution entry point: partition the lock, compose the overlay
//! stack, walk the closure, assemble the environment.

use std::collections::BTreeMap;

use wheelhouse_core::{
    DependencySpec, LockedPackage, Lockfile, Manifest, PackageDefinition, PackageName,
    TargetEnvironment,
};
use wheelhouse_util::errors::WheelhouseResult;

use crate::assemble::{assemble, EnvironmentSet};
use crate::closure::{closure, Closure};
use crate::marker::eval_marker;
use crate::overlay::{Overlay, OverlayStack, ResolvedSet};
use crate::partition::partition;
use crate::version::is_compatible;

/// Everything one resolution needs. All referenced inputs are immutable
/// snapshots; the request itself is consumed because overlays are not
/// clonable.
pub struct ResolutionRequest<'a> {
    pub manifest: &'a Manifest,
    pub lockfile: &'a Lockfile,
    pub target: &'a TargetEnvironment,
    /// Caller-supplied override layers, applied after the defaults in the
    /// order given.
    pub overlays: Vec<Overlay>,
    /// Whether the shipped default layer (build-system injection) is part
    /// of the stack. Callers replacing it wholesale turn it off and supply
    /// their own layer via `with_overlay`.
    pub use_defaults: bool,
    /// Editable (in-place) source mappings: package name to local path.
    pub editable: BTreeMap<PackageName, String>,
    /// Extra build attributes, passed through to the executor.
    pub extra_attrs: BTreeMap<String, serde_json::Value>,
}

impl<'a> ResolutionRequest<'a> {
    pub fn new(
        manifest: &'a Manifest,
        lockfile: &'a Lockfile,
        target: &'a TargetEnvironment,
    ) -> Self {
        Self {
            manifest,
            lockfile,
            target,
            overlays: Vec::new(),
            use_defaults: true,
            editable: BTreeMap::new(),
            extra_attrs: BTreeMap::new(),
        }
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlays.push(overlay);
        self
    }

    /// Drop the shipped default layer from the stack.
    pub fn without_defaults(mut self) -> Self {
        self.use_defaults = false;
        self
    }

    pub fn with_editable(mut self, name: PackageName, path: impl Into<String>) -> Self {
        self.editable.insert(name, path.into());
        self
    }
}

/// The output of one resolution run.
#[derive(Debug)]
pub struct Resolution {
    /// The full composed package universe.
    pub resolved: ResolvedSet,
    /// Packages reachable from the direct dependencies.
    pub closure: Closure,
    /// Packages reachable from direct plus dev dependencies.
    pub check_closure: Closure,
    /// The assembled installable environment.
    pub environment: EnvironmentSet,
}

impl Resolution {
    /// The build-system requirement definitions, for handing to the
    /// executor alongside the environment.
    pub fn build_requirements(&self, manifest: &Manifest) -> Vec<&PackageDefinition> {
        manifest
            .build_requirement_names()
            .iter()
            .filter_map(|name| self.resolved.get(name))
            .collect()
    }

    /// The check (test) packages beyond the runtime closure.
    pub fn check_packages(&self) -> Vec<&PackageDefinition> {
        self.check_closure
            .names()
            .iter()
            .filter(|n| !self.closure.contains(n))
            .filter_map(|n| self.resolved.get(n))
            .collect()
    }
}

/// Resolve a manifest and lock against a target environment.
///
/// The resolved set is rebuilt fully on every call: no state is shared
/// between runs, so callers may resolve several targets concurrently with
/// independent requests.
pub fn resolve(request: ResolutionRequest<'_>) -> WheelhouseResult<Resolution> {
    let manifest = request.manifest;
    tracing::debug!(project = %manifest.project.name, "resolving");

    let part = partition(request.lockfile, request.target)?;

    let mut stack = OverlayStack::new();
    if request.use_defaults {
        stack = stack.extend(default_overlay(manifest));
    }
    for overlay in request.overlays {
        stack = stack.extend(overlay);
    }
    let stack = stack
        .prepend(null_out_overlay(part.incompatible_names()))
        .prepend(seed_overlay(&part.compatible, request.target)?);
    let resolved = stack.compose()?;

    // A direct dependency gated to a different environment is not a root
    // at all; its locked entry was partitioned out alongside it.
    let roots = applicable_roots(&manifest.dependencies, request.target)?;
    let main = closure(&resolved, &roots, &manifest.project.name)?;

    let mut check_roots = roots;
    check_roots.extend(applicable_roots(&manifest.dev_dependencies, request.target)?);
    let check = closure(&resolved, &check_roots, &manifest.project.name)?;

    let environment = assemble(
        manifest,
        &resolved,
        &main,
        &request.editable,
        &request.extra_attrs,
    );

    Ok(Resolution {
        resolved,
        closure: main,
        check_closure: check,
        environment,
    })
}

/// Layer 0: the compatible partition converted 1:1 into base package
/// definitions.
pub fn seed_overlay(
    compatible: &[LockedPackage],
    env: &TargetEnvironment,
) -> WheelhouseResult<Overlay> {
    let mut overlay = Overlay::new();
    for pkg in compatible {
        let def = base_definition(pkg, env)?;
        overlay = overlay.set(pkg.canonical_name(), def);
    }
    Ok(overlay)
}

/// The null-out layer: maps every incompatible name to absent, so later
/// layers cannot resurrect filtered entries by accident. An override that
/// explicitly re-adds a name is still honored.
pub fn null_out_overlay(incompatible: Vec<PackageName>) -> Overlay {
    incompatible
        .into_iter()
        .fold(Overlay::new(), |overlay, name| overlay.remove(name))
}

/// The ecosystem default layer: injects synthetic definitions for
/// build-system requirements the lock does not carry.
pub fn default_overlay(manifest: &Manifest) -> Overlay {
    let mut overlay = Overlay::new();
    for name in manifest.build_requirement_names() {
        let injected = name.clone();
        overlay = overlay.define(name, move |_, below| match below.this()? {
            Some(def) => Ok(def),
            None => {
                tracing::debug!(package = %injected, "injecting synthetic build-system package");
                Ok(PackageDefinition::synthetic(injected.clone(), "0"))
            }
        });
    }
    overlay
}

/// Canonical names of the dependencies that apply to `env`: a dependency
/// gated by its own marker or python range to a different target never
/// becomes a closure root.
fn applicable_roots(
    deps: &BTreeMap<String, DependencySpec>,
    env: &TargetEnvironment,
) -> WheelhouseResult<Vec<PackageName>> {
    let mut names = Vec::new();
    for (raw, spec) in deps {
        if let Some(marker) = spec.markers() {
            if !eval_marker(marker, env)? {
                tracing::debug!(package = %raw, "dependency gated out by marker");
                continue;
            }
        }
        if let Some(range) = spec.python() {
            if !is_compatible(&env.python_version, range)? {
                tracing::debug!(package = %raw, "dependency gated out by python range");
                continue;
            }
        }
        names.push(PackageName::new(raw));
    }
    Ok(names)
}

/// Convert one locked entry into its base definition, dropping propagated
/// edges whose own markers do not apply to the target.
fn base_definition(
    pkg: &LockedPackage,
    env: &TargetEnvironment,
) -> WheelhouseResult<PackageDefinition> {
    let mut def = PackageDefinition::new(pkg.canonical_name(), &pkg.version, pkg.source.clone());
    def.files = pkg.files.clone();
    for (dep_name, dep) in &pkg.dependencies {
        if let Some(marker) = dep.markers() {
            if !eval_marker(marker, env)? {
                continue;
            }
        }
        def.propagated.push(PackageName::new(dep_name));
    }
    Ok(def)
}
