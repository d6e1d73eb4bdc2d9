//! Decoding of plugin stdout into a [`PluginResult`].
//!
//! Decoding is pure: the same bytes, exit code and declared version always
//! yield the same value, and nothing here touches the OS. The success schema
//! is version-dependent; selection goes through an ordered strategy table so
//! a future schema generation is one more table entry, not another branch.

use crate::error::Error;
use crate::types::{CniResult, ErrorResult, LegacyResult, PluginResult};
use crate::version::{Version, CANONICAL_BASELINE, OLDEST_SUPPORTED};

type DecodeFn = fn(&[u8]) -> Result<CniResult, Error>;

/// One entry of the schema table: results declared at `floor` or later (up to
/// the next newer entry) decode with `decode`.
struct Strategy {
    floor: Version,
    decode: DecodeFn,
}

/// Schema generations, newest first. The first entry whose floor does not
/// exceed the declared version wins.
const STRATEGIES: &[Strategy] = &[
    Strategy {
        floor: CANONICAL_BASELINE,
        decode: decode_canonical,
    },
    Strategy {
        floor: OLDEST_SUPPORTED,
        decode: decode_legacy,
    },
];

fn decode_canonical(stdout: &[u8]) -> Result<CniResult, Error> {
    serde_json::from_slice(stdout).map_err(|e| malformed("success", stdout, &e))
}

fn decode_legacy(stdout: &[u8]) -> Result<CniResult, Error> {
    let legacy: LegacyResult =
        serde_json::from_slice(stdout).map_err(|e| malformed("legacy success", stdout, &e))?;
    Ok(CniResult::from(legacy))
}

fn malformed(schema: &str, stdout: &[u8], err: &serde_json::Error) -> Error {
    Error::Protocol(format!(
        "{schema} body is malformed: {err}: {:?}",
        String::from_utf8_lossy(stdout)
    ))
}

/// Interprets a completed invocation's stdout.
///
/// A non-zero `exit_code` demands the structured error body and yields
/// [`PluginResult::Failure`]. Exit code zero demands the success schema
/// selected by `declared_version`, normalized to the canonical form. Output
/// that matches neither contract is a [`Error::Protocol`] violation, which is
/// fatal rather than a result variant.
///
/// # Errors
///
/// [`Error::UnsupportedVersion`] when `declared_version` does not parse or
/// predates every known schema; [`Error::Protocol`] on a malformed body.
pub fn decode(
    stdout: &[u8],
    exit_code: i32,
    declared_version: &str,
) -> Result<PluginResult, Error> {
    if exit_code != 0 {
        let err: ErrorResult = serde_json::from_slice(stdout).map_err(|e| {
            Error::Protocol(format!(
                "plugin exited with code {exit_code} but the error body is malformed: {e}: {:?}",
                String::from_utf8_lossy(stdout)
            ))
        })?;
        return Ok(PluginResult::Failure(err));
    }

    let version: Version = declared_version.parse()?;
    let strategy = STRATEGIES
        .iter()
        .find(|s| s.floor <= version)
        .ok_or_else(|| Error::UnsupportedVersion(declared_version.to_string()))?;
    (strategy.decode)(stdout).map(PluginResult::Success)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::types::{Dns, IpConfig, Route};

    const LEGACY_BODY: &str = r#"{
        "cniVersion": "0.2.0",
        "ip4": {
            "ip": "10.0.0.2/24",
            "gateway": "10.0.0.1",
            "routes": [{"dst": "0.0.0.0/0"}]
        },
        "dns": {"nameservers": ["10.0.0.1"]}
    }"#;

    const CANONICAL_BODY: &str = r#"{
        "ips": [{"address": "10.0.0.2/24", "gateway": "10.0.0.1"}],
        "routes": [{"dst": "0.0.0.0/0"}],
        "dns": {"nameservers": ["10.0.0.1"]}
    }"#;

    fn expected_canonical() -> CniResult {
        CniResult {
            interfaces: vec![],
            ips: vec![IpConfig {
                interface: None,
                address: "10.0.0.2/24".to_string(),
                gateway: Some("10.0.0.1".to_string()),
            }],
            routes: vec![Route {
                dst: "0.0.0.0/0".to_string(),
                gw: None,
            }],
            dns: Some(Dns {
                nameservers: vec!["10.0.0.1".to_string()],
                ..Dns::default()
            }),
        }
    }

    /// Every pre-baseline version must migrate the legacy payload to the same
    /// canonical value the equivalent canonical payload decodes to.
    #[rstest]
    #[case("0.1.0")]
    #[case("0.2.0")]
    fn legacy_and_canonical_payloads_decode_equal(#[case] legacy_version: &str) {
        let from_legacy = decode(LEGACY_BODY.as_bytes(), 0, legacy_version).unwrap();
        let from_canonical = decode(CANONICAL_BODY.as_bytes(), 0, "0.3.1").unwrap();
        assert_eq!(from_legacy, from_canonical);
        assert_eq!(from_legacy, PluginResult::Success(expected_canonical()));
    }

    #[rstest]
    #[case("0.3.0")]
    #[case("0.3.1")]
    #[case("0.4.0")]
    #[case("1.0.0")]
    fn baseline_and_later_use_the_canonical_schema(#[case] version: &str) {
        let result = decode(CANONICAL_BODY.as_bytes(), 0, version).unwrap();
        assert_eq!(result, PluginResult::Success(expected_canonical()));
    }

    #[test]
    fn nonzero_exit_with_wellformed_body_is_a_failure_value() {
        let body = r#"{"cniVersion":"0.3.1","code":7,"msg":"bad config","details":"missing subnet"}"#;
        let result = decode(body.as_bytes(), 1, "0.3.1").unwrap();
        let err = result.failure().expect("failure variant");
        assert_eq!(err.code, 7);
        assert_eq!(err.msg, "bad config");
        assert_eq!(err.details, "missing subnet");
    }

    #[rstest]
    #[case::empty(b"" as &[u8])]
    #[case::not_json(b"panic: something broke" as &[u8])]
    #[case::wrong_shape(br#"{"msg": "no code field"}"# as &[u8])]
    fn nonzero_exit_with_malformed_body_is_a_protocol_violation(#[case] stdout: &[u8]) {
        let err = decode(stdout, 1, "0.3.1").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[rstest]
    #[case::garbage(b"not json at all" as &[u8])]
    #[case::wrong_type(br#"["not", "an", "object"]"# as &[u8])]
    fn zero_exit_with_malformed_body_is_a_protocol_violation(#[case] stdout: &[u8]) {
        let err = decode(stdout, 0, "0.3.1").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn unparsable_declared_version_is_rejected() {
        let err = decode(CANONICAL_BODY.as_bytes(), 0, "three.one").unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(_)));
    }

    #[test]
    fn version_below_every_strategy_is_rejected() {
        let err = decode(LEGACY_BODY.as_bytes(), 0, "0.0.1").unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(_)));
    }

    #[test]
    fn decoding_is_deterministic() {
        let a = decode(LEGACY_BODY.as_bytes(), 0, "0.2.0").unwrap();
        let b = decode(LEGACY_BODY.as_bytes(), 0, "0.2.0").unwrap();
        assert_eq!(a, b);
    }
}
