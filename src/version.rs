//! CNI specification version handling.
//!
//! Result schemas changed at 0.3.0, so the declared `cniVersion` of a
//! configuration decides how plugin stdout is parsed. Versions compare
//! numerically component by component ("0.10.0" sorts after "0.9.0"), not
//! lexically.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// First version of the canonical result schema. Configurations declaring an
/// older version produce the legacy per-family schema.
pub const CANONICAL_BASELINE: Version = Version {
    major: 0,
    minor: 3,
    patch: 0,
};

/// Oldest version the harness decodes at all.
pub const OLDEST_SUPPORTED: Version = Version {
    major: 0,
    minor: 1,
    patch: 0,
};

/// A CNI specification version, ordered semantically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for Version {
    type Err = Error;

    /// Parses `"MAJOR.MINOR[.PATCH]"`. A missing patch component defaults to
    /// zero; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::UnsupportedVersion(s.to_string());
        let mut parts = s.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Version {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Version {
    /// Whether results declared at this version use the canonical schema.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        *self >= CANONICAL_BASELINE
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0.1.0", Version { major: 0, minor: 1, patch: 0 })]
    #[case("0.3.1", Version { major: 0, minor: 3, patch: 1 })]
    #[case("1.0.0", Version { major: 1, minor: 0, patch: 0 })]
    #[case("0.4", Version { major: 0, minor: 4, patch: 0 })]
    fn parses_valid_versions(#[case] input: &str, #[case] expected: Version) {
        assert_eq!(input.parse::<Version>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("one.two.three")]
    #[case("0.3.1.4")]
    #[case("0.3.-1")]
    fn rejects_invalid_versions(#[case] input: &str) {
        let err = input.parse::<Version>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(_)));
    }

    #[rstest]
    #[case("0.1.0", "0.2.0")]
    #[case("0.2.0", "0.3.0")]
    #[case("0.3.1", "0.4.0")]
    #[case("0.9.0", "0.10.0")]
    #[case("0.10.0", "1.0.0")]
    fn ordering_is_numeric_not_lexical(#[case] lower: &str, #[case] higher: &str) {
        let lower: Version = lower.parse().unwrap();
        let higher: Version = higher.parse().unwrap();
        assert!(lower < higher);
    }

    #[rstest]
    #[case("0.1.0", false)]
    #[case("0.2.0", false)]
    #[case("0.3.0", true)]
    #[case("0.3.1", true)]
    #[case("1.1.0", true)]
    fn canonical_baseline_split(#[case] version: &str, #[case] canonical: bool) {
        let version: Version = version.parse().unwrap();
        assert_eq!(version.is_canonical(), canonical);
    }

    #[test]
    fn display_round_trips() {
        let version: Version = "0.3.1".parse().unwrap();
        assert_eq!(version.to_string(), "0.3.1");
        assert_eq!(version.to_string().parse::<Version>().unwrap(), version);
    }
}
