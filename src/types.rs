//! CNI wire types exchanged with the plugin under test.
//!
//! The harness treats the network configuration as an opaque passthrough
//! document: [`NetConf`] only surfaces the fields the harness itself needs
//! (the declared protocol version and the IPAM plugin name) and keeps the
//! rest in `custom` so the bytes handed to the plugin are complete.
//!
//! Result types come in two schema generations:
//!
//! - [`CniResult`] — the canonical success schema (0.3.0 and later):
//!   interfaces, IP configurations, routes, DNS.
//! - [`LegacyResult`] — the pre-0.3.0 schema with per-family `ip4`/`ip6`
//!   blocks, migrated losslessly into [`CniResult`] by the decoder.
//!
//! A completed invocation decodes to exactly one [`PluginResult`] variant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Network configuration document, passed to the plugin on stdin unmodified.
///
/// Please see <https://github.com/containernetworking/cni/blob/v1.1.0/SPEC.md#section-1-network-configuration-format>.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetConf {
    /// CNI specification version this configuration declares. Drives result
    /// schema selection in [`crate::decode`].
    pub cni_version: String,
    /// Network name, unique per host.
    pub name: String,
    /// Name of the plugin binary on disk.
    pub r#type: String,
    /// IPAM delegation, if any. The `type` inside names the IPAM binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,
    /// Everything else is plugin-specific and passed through untouched.
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

/// IPAM (IP Address Management) section of a network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ipam {
    /// Filename of the IPAM plugin executable.
    pub r#type: String,
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

/// DNS configuration reported by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dns {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Canonical CNI success result (schema 0.3.0 and later).
///
/// Please see <https://github.com/containernetworking/cni/blob/v1.1.0/SPEC.md#success>.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CniResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<IpConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
}

/// An interface created by the attachment, host-side or sandbox-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub mac: String,
    /// Isolation domain (netns path) for sandbox interfaces, absent for host
    /// interfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

/// An IP assignment reported by the plugin, in CIDR notation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpConfig {
    /// Index into `interfaces` this address applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<u32>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// A route installed by the plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    /// Destination in CIDR notation.
    pub dst: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<String>,
}

/// Pre-0.3.0 success result with per-family IP configuration blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResult {
    #[serde(default)]
    pub cni_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip4: Option<LegacyIpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip6: Option<LegacyIpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
}

/// One address family of a [`LegacyResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyIpConfig {
    /// Assigned address in CIDR notation.
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

impl From<LegacyResult> for CniResult {
    /// Migrates a legacy result into the canonical schema. Every field of the
    /// legacy payload survives: both family blocks become `ips` entries, their
    /// routes are concatenated, DNS carries over.
    fn from(legacy: LegacyResult) -> Self {
        let mut ips = Vec::new();
        let mut routes = Vec::new();
        for family in [legacy.ip4, legacy.ip6].into_iter().flatten() {
            ips.push(IpConfig {
                interface: None,
                address: family.ip,
                gateway: family.gateway,
            });
            routes.extend(family.routes);
        }
        CniResult {
            interfaces: Vec::new(),
            ips,
            routes,
            dns: legacy.dns,
        }
    }
}

/// Structured error body a plugin must emit on a non-zero exit.
///
/// Please see <https://github.com/containernetworking/cni/blob/v1.1.0/SPEC.md#Error>.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    #[serde(default)]
    pub cni_version: String,
    /// Numeric error code; 1-11 are spec-defined, 100+ plugin-specific.
    pub code: u32,
    pub msg: String,
    #[serde(default)]
    pub details: String,
}

/// Outcome of one decoded plugin invocation. Exactly one variant is ever
/// populated; malformed output is a harness error, not a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginResult {
    /// Exit code 0 with a well-formed success body, normalized to the
    /// canonical schema.
    Success(CniResult),
    /// Non-zero exit with a well-formed error body.
    Failure(ErrorResult),
}

impl PluginResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, PluginResult::Success(_))
    }

    /// Returns the canonical result, if this is a success.
    #[must_use]
    pub fn success(&self) -> Option<&CniResult> {
        match self {
            PluginResult::Success(res) => Some(res),
            PluginResult::Failure(_) => None,
        }
    }

    /// Returns the plugin-reported error, if this is a failure.
    #[must_use]
    pub fn failure(&self) -> Option<&ErrorResult> {
        match self {
            PluginResult::Success(_) => None,
            PluginResult::Failure(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn netconf_keeps_unknown_fields_for_passthrough() {
        let raw = r#"{
            "cniVersion": "0.3.1",
            "name": "test",
            "type": "examplecni",
            "mtu": 1500,
            "ipam": {"type": "host-local", "subnet": "10.0.0.0/24"}
        }"#;
        let conf: NetConf = serde_json::from_str(raw).unwrap();
        assert_eq!(conf.cni_version, "0.3.1");
        assert_eq!(conf.r#type, "examplecni");
        assert_eq!(conf.custom.get("mtu"), Some(&json!(1500)));

        let ipam = conf.ipam.as_ref().unwrap();
        assert_eq!(ipam.r#type, "host-local");
        assert_eq!(ipam.custom.get("subnet"), Some(&json!("10.0.0.0/24")));

        // Re-serialization must keep the plugin-specific fields.
        let out = serde_json::to_value(&conf).unwrap();
        assert_eq!(out["mtu"], json!(1500));
        assert_eq!(out["ipam"]["subnet"], json!("10.0.0.0/24"));
    }

    #[test]
    fn error_result_tolerates_missing_optional_fields() {
        let err: ErrorResult =
            serde_json::from_str(r#"{"code": 7, "msg": "invalid config"}"#).unwrap();
        assert_eq!(err.code, 7);
        assert_eq!(err.msg, "invalid config");
        assert_eq!(err.details, "");
    }

    #[rstest]
    #[case::both_families(
        LegacyResult {
            cni_version: "0.2.0".to_string(),
            ip4: Some(LegacyIpConfig {
                ip: "10.0.0.2/24".to_string(),
                gateway: Some("10.0.0.1".to_string()),
                routes: vec![Route { dst: "0.0.0.0/0".to_string(), gw: None }],
            }),
            ip6: Some(LegacyIpConfig {
                ip: "fd00::2/64".to_string(),
                gateway: None,
                routes: vec![Route { dst: "::/0".to_string(), gw: Some("fd00::1".to_string()) }],
            }),
            dns: Some(Dns { nameservers: vec!["10.0.0.1".to_string()], ..Dns::default() }),
        },
        2,
        2
    )]
    #[case::v4_only(
        LegacyResult {
            cni_version: "0.1.0".to_string(),
            ip4: Some(LegacyIpConfig {
                ip: "192.168.1.5/32".to_string(),
                gateway: None,
                routes: vec![],
            }),
            ip6: None,
            dns: None,
        },
        1,
        0
    )]
    fn legacy_migration_keeps_every_field(
        #[case] legacy: LegacyResult,
        #[case] expected_ips: usize,
        #[case] expected_routes: usize,
    ) {
        let dns = legacy.dns.clone();
        let v4 = legacy.ip4.clone();
        let migrated = CniResult::from(legacy);

        assert_eq!(migrated.ips.len(), expected_ips);
        assert_eq!(migrated.routes.len(), expected_routes);
        assert_eq!(migrated.dns, dns);
        if let Some(v4) = v4 {
            assert_eq!(migrated.ips[0].address, v4.ip);
            assert_eq!(migrated.ips[0].gateway, v4.gateway);
        }
    }

    #[test]
    fn plugin_result_accessors_are_exclusive() {
        let ok = PluginResult::Success(CniResult::default());
        assert!(ok.is_success());
        assert!(ok.success().is_some());
        assert!(ok.failure().is_none());

        let failed = PluginResult::Failure(ErrorResult {
            cni_version: "0.3.1".to_string(),
            code: 11,
            msg: "try again".to_string(),
            details: String::new(),
        });
        assert!(!failed.is_success());
        assert!(failed.success().is_none());
        assert_eq!(failed.failure().unwrap().code, 11);
    }
}
