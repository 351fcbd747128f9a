//! Version parsing, comparison, and range matching.
//!
//! Versions compare by dotted-integer ordering, not lexically, so
//! `1.10` > `1.9` and trailing zero segments are insignificant
//! (`1.0` == `1.0.0`). Range expressions use the conventional comparator
//! grammar: `==`, `!=`, `>=`, `<=`, `>`, `<`, `~=` (compatible release),
//! wildcard components, comma-separated AND clauses, and `||`-separated
//! OR groups.

use std::cmp::Ordering;
use std::fmt;

use wheelhouse_util::errors::{WheelhouseError, WheelhouseResult};

/// A parsed version with numerically comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    pub original: String,
    segments: Vec<u64>,
}

impl Version {
    /// Parse a concrete version string.
    ///
    /// Lenient about trailing release tags (`1.9b1` reads as `1.9`); a
    /// version with no leading numeric component at all is malformed.
    pub fn parse(version: &str) -> WheelhouseResult<Self> {
        let trimmed = version.trim();
        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            let n = digits.parse::<u64>().map_err(|_| WheelhouseError::MalformedConstraint {
                expr: version.to_string(),
                fragment: part.to_string(),
            })?;
            segments.push(n);
            // A tag glued onto a segment ends the numeric prefix.
            if digits.len() < part.len() {
                break;
            }
        }
        if segments.is_empty() {
            return Err(WheelhouseError::MalformedConstraint {
                expr: version.to_string(),
                fragment: trimmed.to_string(),
            });
        }
        Ok(Self {
            original: trimmed.to_string(),
            segments,
        })
    }

    fn segment(&self, i: usize) -> u64 {
        self.segments.get(i).copied().unwrap_or(0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.segments.len().max(other.segments.len());
        for i in 0..max_len {
            let ord = self.segment(i).cmp(&other.segment(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparison operator in a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    /// `~=`: compatible release.
    Compatible,
}

/// The version pattern a clause compares against; `wildcard` marks a
/// trailing `*` component.
#[derive(Debug, Clone)]
struct Pattern {
    segments: Vec<u64>,
    wildcard: bool,
}

impl Pattern {
    /// Whether `version` falls inside the wildcard prefix.
    fn prefix_matches(&self, version: &Version) -> bool {
        self.segments
            .iter()
            .enumerate()
            .all(|(i, &s)| version.segment(i) == s)
    }

    fn as_version(&self) -> Version {
        Version {
            original: self
                .segments
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("."),
            segments: self.segments.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    pattern: Pattern,
}

impl Comparator {
    fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Eq if self.pattern.wildcard => self.pattern.prefix_matches(version),
            Op::Ne if self.pattern.wildcard => !self.pattern.prefix_matches(version),
            Op::Eq => version.cmp(&self.pattern.as_version()) == Ordering::Equal,
            Op::Ne => version.cmp(&self.pattern.as_version()) != Ordering::Equal,
            Op::Ge => version.cmp(&self.pattern.as_version()) != Ordering::Less,
            Op::Le => version.cmp(&self.pattern.as_version()) != Ordering::Greater,
            Op::Gt => version.cmp(&self.pattern.as_version()) == Ordering::Greater,
            Op::Lt => version.cmp(&self.pattern.as_version()) == Ordering::Less,
            Op::Compatible => {
                // ~=X.Y.Z is >=X.Y.Z plus ==X.Y.*
                let lower = self.pattern.as_version();
                if version.cmp(&lower) == Ordering::Less {
                    return false;
                }
                let prefix = Pattern {
                    segments: self.pattern.segments[..self.pattern.segments.len() - 1].to_vec(),
                    wildcard: true,
                };
                prefix.prefix_matches(version)
            }
        }
    }
}

/// A parsed version-range expression: an OR of AND clause groups.
#[derive(Debug, Clone)]
pub struct VersionReq {
    groups: Vec<Vec<Comparator>>,
}

impl VersionReq {
    /// Parse a range expression.
    ///
    /// `*` (and the empty string) match everything; a bare version means
    /// exact equality.
    pub fn parse(expr: &str) -> WheelhouseResult<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self { groups: vec![Vec::new()] });
        }

        let mut groups = Vec::new();
        for group in trimmed.split("||") {
            let mut comparators = Vec::new();
            for clause in group.split(',') {
                comparators.push(parse_clause(expr, clause)?);
            }
            groups.push(comparators);
        }
        Ok(Self { groups })
    }

    /// Check whether a version satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|c| c.matches(version)))
    }
}

fn parse_clause(expr: &str, clause: &str) -> WheelhouseResult<Comparator> {
    let clause = clause.trim();
    let malformed = || WheelhouseError::MalformedConstraint {
        expr: expr.to_string(),
        fragment: clause.to_string(),
    };

    let (op, rest) = if let Some(rest) = clause.strip_prefix("==") {
        (Op::Eq, rest)
    } else if let Some(rest) = clause.strip_prefix("!=") {
        (Op::Ne, rest)
    } else if let Some(rest) = clause.strip_prefix(">=") {
        (Op::Ge, rest)
    } else if let Some(rest) = clause.strip_prefix("<=") {
        (Op::Le, rest)
    } else if let Some(rest) = clause.strip_prefix("~=") {
        (Op::Compatible, rest)
    } else if let Some(rest) = clause.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = clause.strip_prefix('<') {
        (Op::Lt, rest)
    } else {
        // Bare version: exact match
        (Op::Eq, clause)
    };

    let pattern = parse_pattern(rest.trim()).ok_or_else(malformed)?;
    if op == Op::Compatible && (pattern.wildcard || pattern.segments.len() < 2) {
        return Err(malformed());
    }
    if pattern.segments.is_empty() && !pattern.wildcard {
        return Err(malformed());
    }
    Ok(Comparator { op, pattern })
}

fn parse_pattern(s: &str) -> Option<Pattern> {
    if s.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    let mut wildcard = false;
    let parts: Vec<&str> = s.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "*" {
            // A wildcard must be the final component.
            if i != parts.len() - 1 {
                return None;
            }
            wildcard = true;
        } else if part.chars().all(|c| c.is_ascii_digit()) && !part.is_empty() {
            segments.push(part.parse::<u64>().ok()?);
        } else {
            return None;
        }
    }
    Some(Pattern { segments, wildcard })
}

/// Evaluate a version string against a range expression.
///
/// Both sides are parsed fresh; an unparseable expression is an error,
/// never silently "compatible".
pub fn is_compatible(version: &str, range: &str) -> WheelhouseResult<bool> {
    let version = Version::parse(version)?;
    let req = VersionReq::parse(range)?;
    Ok(req.matches(&version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_not_lexical() {
        let v110 = Version::parse("1.10").unwrap();
        let v19 = Version::parse("1.9").unwrap();
        assert!(v110 > v19);
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(Version::parse("1.0").unwrap(), Version::parse("1.0.0").unwrap());
    }

    #[test]
    fn release_tag_truncates() {
        let v = Version::parse("1.9b1").unwrap();
        assert_eq!(v, Version::parse("1.9").unwrap());
    }

    #[test]
    fn non_numeric_version_is_malformed() {
        assert!(Version::parse("latest").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn simple_bounds() {
        assert!(is_compatible("3.11", ">=3.8").unwrap());
        assert!(!is_compatible("3.7", ">=3.8").unwrap());
        assert!(is_compatible("3.7.2", "<3.8").unwrap());
        assert!(!is_compatible("3.8", "<3.8").unwrap());
    }

    #[test]
    fn and_clauses() {
        let range = ">=2.7,<4.0,!=3.0.*,!=3.1.*";
        assert!(is_compatible("3.8", range).unwrap());
        assert!(is_compatible("2.7.18", range).unwrap());
        assert!(!is_compatible("3.0.5", range).unwrap());
        assert!(!is_compatible("3.1", range).unwrap());
        assert!(!is_compatible("4.0", range).unwrap());
    }

    #[test]
    fn or_groups() {
        let range = "<2.0 || >=3.0";
        assert!(is_compatible("1.5", range).unwrap());
        assert!(is_compatible("3.1", range).unwrap());
        assert!(!is_compatible("2.5", range).unwrap());
    }

    #[test]
    fn wildcard_eq() {
        assert!(is_compatible("1.4.9", "==1.4.*").unwrap());
        assert!(!is_compatible("1.5.0", "==1.4.*").unwrap());
        assert!(is_compatible("1.5.0", "!=1.4.*").unwrap());
    }

    #[test]
    fn bare_version_is_exact() {
        assert!(is_compatible("1.4", "1.4").unwrap());
        assert!(is_compatible("1.4.0", "1.4").unwrap());
        assert!(!is_compatible("1.4.1", "1.4").unwrap());
    }

    #[test]
    fn star_matches_everything() {
        assert!(is_compatible("0.0.1", "*").unwrap());
        assert!(is_compatible("99", "*").unwrap());
    }

    #[test]
    fn compatible_release() {
        assert!(is_compatible("1.4.7", "~=1.4.2").unwrap());
        assert!(!is_compatible("1.5.0", "~=1.4.2").unwrap());
        assert!(!is_compatible("1.4.1", "~=1.4.2").unwrap());
        assert!(is_compatible("1.9", "~=1.4").unwrap());
        assert!(!is_compatible("2.0", "~=1.4").unwrap());
    }

    #[test]
    fn compatible_release_needs_two_segments() {
        assert!(VersionReq::parse("~=2").is_err());
        assert!(VersionReq::parse("~=1.4.*").is_err());
    }

    #[test]
    fn malformed_reports_fragment() {
        let err = VersionReq::parse(">=3.8,banana").unwrap_err();
        match err {
            WheelhouseError::MalformedConstraint { expr, fragment } => {
                assert_eq!(expr, ">=3.8,banana");
                assert_eq!(fragment, "banana");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn interior_wildcard_is_malformed() {
        assert!(VersionReq::parse("==1.*.4").is_err());
    }
}
