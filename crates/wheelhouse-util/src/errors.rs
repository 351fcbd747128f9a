use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all wheelhouse operations.
///
/// Resolution is a pure computation over already-loaded inputs, so every
/// failure here is deterministic: retrying without changing the inputs
/// cannot succeed.
#[derive(Debug, Error, Diagnostic)]
pub enum WheelhouseError {
    /// A version-range or marker expression failed to parse.
    ///
    /// Never downgraded to "compatible": a constraint we cannot read is a
    /// constraint we cannot honor.
    #[error("malformed constraint `{expr}`: unexpected `{fragment}`")]
    #[diagnostic(help("check the version-range or marker expression in the lock file"))]
    MalformedConstraint { expr: String, fragment: String },

    /// An override layer's evaluation of `self[name]` re-entered itself
    /// before producing a value.
    #[error("circular override: `{name}` depends on its own not-yet-resolved definition")]
    #[diagnostic(help(
        "an override for this package references self[\"{name}\"] with no base definition to fall back on"
    ))]
    CircularOverride { name: String },

    /// A closure root or propagated-dependency edge points at a name absent
    /// from the resolved set.
    #[error("missing dependency: `{name}` (required by `{requested_by}`) is not in the resolved set")]
    #[diagnostic(help(
        "the package may have been filtered out for this platform, nulled by an override, or be absent from the lock"
    ))]
    MissingDependency { name: String, requested_by: String },

    /// Two lock entries claim the same canonical name.
    #[error("duplicate definition: `{name}` appears more than once in the lock")]
    #[diagnostic(help("the lock file is corrupt; regenerate it"))]
    DuplicateDefinition { name: String },

    /// Invalid or inconsistent manifest data.
    #[error("manifest error: {message}")]
    Manifest { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias used throughout the wheelhouse crates.
pub type WheelhouseResult<T> = Result<T, WheelhouseError>;
