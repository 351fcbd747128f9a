//! Core data types for the wheelhouse resolution engine.
//!
//! This crate defines the fundamental types the resolver operates on:
//! manifests, lock files, canonical package names, target environments,
//! resolved package definitions, and the license short-code table.
//!
//! Everything here is an immutable in-memory snapshot. This crate is
//! intentionally free of file I/O, network access, and async code; the
//! surrounding layer is responsible for getting documents parsed into
//! these types.

pub mod environment;
pub mod license;
pub mod lockfile;
pub mod manifest;
pub mod name;
pub mod package;

pub use environment::TargetEnvironment;
pub use lockfile::{Category, FileHash, LockedPackage, Lockfile, PackageSource};
pub use manifest::{BuildSystem, DependencySpec, Manifest, ProjectMetadata};
pub use name::PackageName;
pub use package::PackageDefinition;
