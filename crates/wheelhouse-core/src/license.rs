//! License short-code to SPDX identifier mapping.
//!
//! Manifests carry compact license codes; the build executor wants SPDX
//! identifiers. This is cosmetic metadata passthrough, kept here so the
//! assembler does not embed the table.

/// Resolve a license short code to its SPDX identifier.
///
/// Codes already in SPDX form (or unknown ones) return `None`; callers
/// pass the original string through unchanged in that case.
pub fn spdx_identifier(code: &str) -> Option<&'static str> {
    match code.to_ascii_lowercase().as_str() {
        "mit" => Some("MIT"),
        "apache2" | "apache-2" | "asl20" => Some("Apache-2.0"),
        "bsd" | "bsd3" => Some("BSD-3-Clause"),
        "bsd2" => Some("BSD-2-Clause"),
        "gpl2" => Some("GPL-2.0-only"),
        "gpl2plus" => Some("GPL-2.0-or-later"),
        "gpl3" => Some("GPL-3.0-only"),
        "gpl3plus" => Some("GPL-3.0-or-later"),
        "lgpl2" => Some("LGPL-2.0-only"),
        "lgpl21" => Some("LGPL-2.1-only"),
        "lgpl3" => Some("LGPL-3.0-only"),
        "mpl20" | "mpl2" => Some("MPL-2.0"),
        "isc" => Some("ISC"),
        "psfl" | "psf" => Some("PSF-2.0"),
        "unlicense" => Some("Unlicense"),
        "zlib" => Some("Zlib"),
        _ => None,
    }
}

/// Resolve a short code, falling back to the code itself.
pub fn resolve(code: &str) -> String {
    spdx_identifier(code).map_or_else(|| code.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(spdx_identifier("mit"), Some("MIT"));
        assert_eq!(spdx_identifier("BSD3"), Some("BSD-3-Clause"));
        assert_eq!(spdx_identifier("apache2"), Some("Apache-2.0"));
    }

    #[test]
    fn unknown_code_passes_through() {
        assert_eq!(spdx_identifier("MIT-with-exceptions"), None);
        assert_eq!(resolve("MIT-with-exceptions"), "MIT-with-exceptions");
    }
}
