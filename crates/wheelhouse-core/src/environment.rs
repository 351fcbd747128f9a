use serde::{Deserialize, Serialize};

/// The interpreter/platform triple a resolution targets.
///
/// Supplied by the caller, used only for constraint evaluation, never
/// mutated. Marker expressions look attributes up by name through
/// [`TargetEnvironment::lookup`]; a variable this type does not know
/// evaluates the enclosing atomic comparison to false rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEnvironment {
    /// Interpreter version, e.g. `"3.11"` or `"3.11.4"`.
    pub python_version: String,
    /// Platform identifier, e.g. `"linux"`, `"darwin"`, `"win32"`.
    pub sys_platform: String,
    /// Machine architecture, e.g. `"x86_64"`, `"arm64"`.
    pub platform_machine: String,
    /// Interpreter implementation, e.g. `"cpython"`, `"pypy"`.
    pub implementation_name: String,
    /// The extra being evaluated, if resolving an extras group.
    #[serde(default)]
    pub extra: Option<String>,
}

impl TargetEnvironment {
    /// Look up a marker variable by name.
    pub fn lookup(&self, var: &str) -> Option<&str> {
        match var {
            "python_version" | "python_full_version" => Some(&self.python_version),
            "sys_platform" => Some(&self.sys_platform),
            "platform_machine" => Some(&self.platform_machine),
            "implementation_name" => Some(&self.implementation_name),
            "extra" => self.extra.as_deref(),
            _ => None,
        }
    }

    /// Whether a marker variable carries a version value, i.e. comparisons
    /// against it use dotted-integer ordering rather than string ordering.
    pub fn is_version_variable(var: &str) -> bool {
        matches!(var, "python_version" | "python_full_version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> TargetEnvironment {
        TargetEnvironment {
            python_version: "3.11".into(),
            sys_platform: "linux".into(),
            platform_machine: "x86_64".into(),
            implementation_name: "cpython".into(),
            extra: None,
        }
    }

    #[test]
    fn known_variables_resolve() {
        let env = linux();
        assert_eq!(env.lookup("python_version"), Some("3.11"));
        assert_eq!(env.lookup("sys_platform"), Some("linux"));
        assert_eq!(env.lookup("implementation_name"), Some("cpython"));
    }

    #[test]
    fn unknown_variable_is_none() {
        assert_eq!(linux().lookup("os_name"), None);
    }

    #[test]
    fn extra_unset_is_none() {
        assert_eq!(linux().lookup("extra"), None);
        let mut env = linux();
        env.extra = Some("socks".into());
        assert_eq!(env.lookup("extra"), Some("socks"));
    }
}
