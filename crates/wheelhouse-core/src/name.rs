use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical package name.
///
/// Lock files and manifests spell names inconsistently (`Foo_Bar`,
/// `foo.bar`, `foo-bar` all refer to the same package), so every map key in
/// the engine uses this normalized form: ASCII lowercase with `_` and `.`
/// folded to `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Normalize a raw name into canonical form.
    pub fn new(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '.' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PackageName {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}
