//! Host-side veth provisioning with deterministic, length-bounded naming.
//!
//! Naming is a pure function of the workload identity so repeated runs (and
//! the DEL side) can recompute it without state. Linux caps interface names
//! at 15 bytes (IFNAMSIZ minus the terminator), so both naming schemes fit a
//! fixed prefix plus an 11-character payload:
//!
//! - with pod identity: `cni` + the first 11 hex chars of a SHA-256 digest
//!   over `k8s.<node>.<namespace>/<pod>.<ifname>.<container_id>`. Truncating
//!   the digest keeps determinism; collisions need ~2^22 concurrent
//!   workloads, far beyond a test host.
//! - without: `cni` + the first 11 characters of the container id (shorter
//!   ids are taken whole).

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Error;
use crate::invoke::{PodIdentity, DEFAULT_IFNAME};
use crate::link;

/// Prefix of every harness-created host-side veth.
pub const HOST_VETH_PREFIX: &str = "cni";

/// Fixed name of the container-side peer.
///
/// This constant is shared across all invocations that create host veths:
/// concurrent callers without pod identity would race on it, so such callers
/// must serialize veth provisioning. The cleanup-before-create below makes
/// the operation idempotent across aborted runs, not concurrency-safe.
pub const PEER_VETH_NAME: &str = "cnipeer";

/// IFNAMSIZ minus the NUL terminator.
pub const MAX_LINK_NAME_LEN: usize = 15;

/// Characters of digest or container id appended to the prefix.
const PAYLOAD_LEN: usize = 11;

const _: () = assert!(HOST_VETH_PREFIX.len() + PAYLOAD_LEN <= MAX_LINK_NAME_LEN);

const ORCHESTRATOR: &str = "k8s";

/// MTU applied to the host side of the pair.
pub const VETH_MTU: u32 = 1500;

/// Computes the host-side veth name for a workload. Pure; never exceeds
/// [`MAX_LINK_NAME_LEN`] for any input.
#[must_use]
pub fn host_veth_name(
    container_id: &str,
    pod: Option<&PodIdentity>,
    node_name: &str,
    ifname: &str,
) -> String {
    let payload: String = match pod {
        Some(pod) => {
            let identity = format!(
                "{ORCHESTRATOR}.{node_name}.{}/{}.{ifname}.{container_id}",
                pod.namespace, pod.name
            );
            let digest = Sha256::digest(identity.as_bytes());
            digest
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
                .chars()
                .take(PAYLOAD_LEN)
                .collect()
        }
        None => container_id.chars().take(PAYLOAD_LEN).collect(),
    };
    format!("{HOST_VETH_PREFIX}{payload}")
}

/// Creates the host-side veth pair for a container.
///
/// If a stale peer link is left over from a previous aborted run it is
/// deleted first, making the operation idempotent across test runs sharing
/// [`PEER_VETH_NAME`]. The pair is created with MTU [`VETH_MTU`] and the host
/// side brought up. OS-level failures are surfaced, not retried.
///
/// # Errors
///
/// [`Error::Netlink`] on any link operation failure.
pub fn create_host_veth(
    container_id: &str,
    pod: Option<&PodIdentity>,
    node_name: &str,
) -> Result<(), Error> {
    let host_name = host_veth_name(container_id, pod, node_name, DEFAULT_IFNAME);

    if link::link_by_name(PEER_VETH_NAME).is_ok() {
        debug!(peer = PEER_VETH_NAME, "deleting stale peer veth");
        link::del_link(PEER_VETH_NAME)?;
    }

    debug!(host = %host_name, peer = PEER_VETH_NAME, "creating veth pair");
    link::create_veth(&host_name, PEER_VETH_NAME, VETH_MTU)?;
    link::set_link_up(&host_name)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const LONG_ID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef";

    #[rstest]
    #[case::empty_id("")]
    #[case::short_id("ab")]
    #[case::exact_budget("0123456789a")]
    #[case::long_id(LONG_ID)]
    fn fallback_names_never_exceed_the_limit(#[case] container_id: &str) {
        let name = host_veth_name(container_id, None, "node0", "eth0");
        assert!(name.len() <= MAX_LINK_NAME_LEN, "{name:?} too long");
        assert!(name.starts_with(HOST_VETH_PREFIX));
    }

    #[rstest]
    #[case::short("web", "default", "node0")]
    #[case::long(
        "a-pod-name-well-beyond-any-interface-name-limit",
        "a-namespace-that-is-also-very-long",
        "node-with-a-long-hostname.example.com"
    )]
    fn workload_names_never_exceed_the_limit(
        #[case] pod_name: &str,
        #[case] namespace: &str,
        #[case] node: &str,
    ) {
        let pod = PodIdentity::new(pod_name, namespace);
        let name = host_veth_name(LONG_ID, Some(&pod), node, "eth0");
        assert_eq!(name.len(), HOST_VETH_PREFIX.len() + 11);
        assert!(name.len() <= MAX_LINK_NAME_LEN);
        assert!(name.starts_with(HOST_VETH_PREFIX));
    }

    /// Both naming schemes share the same eleven-character payload budget.
    #[test]
    fn digest_and_fallback_payloads_share_the_budget() {
        let pod = PodIdentity::new("nginx", "test");
        let digest = host_veth_name(LONG_ID, Some(&pod), "node0", "eth0");
        let fallback = host_veth_name(LONG_ID, None, "node0", "eth0");
        assert_eq!(digest.len(), fallback.len());
        assert_eq!(fallback, format!("{HOST_VETH_PREFIX}{}", &LONG_ID[..11]));
    }

    #[test]
    fn fallback_truncates_a_prefix_of_the_container_id() {
        assert_eq!(host_veth_name("abcdef0123", None, "node0", "eth0"), "cniabcdef0123");
        assert_eq!(
            host_veth_name("abcdef0123456789", None, "node0", "eth0"),
            "cniabcdef01234"
        );
    }

    #[test]
    fn workload_names_are_deterministic() {
        let pod = PodIdentity::new("nginx", "test");
        let a = host_veth_name("abcdef0123", Some(&pod), "node0", "eth0");
        let b = host_veth_name("abcdef0123", Some(&pod), "node0", "eth0");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_workloads_get_distinct_names() {
        let nginx = PodIdentity::new("nginx", "test");
        let redis = PodIdentity::new("redis", "test");
        let other_ns = PodIdentity::new("nginx", "prod");

        let base = host_veth_name("abcdef0123", Some(&nginx), "node0", "eth0");
        assert_ne!(base, host_veth_name("abcdef0123", Some(&redis), "node0", "eth0"));
        assert_ne!(base, host_veth_name("abcdef0123", Some(&other_ns), "node0", "eth0"));
        assert_ne!(base, host_veth_name("fedcba9876", Some(&nginx), "node0", "eth0"));
    }
}
