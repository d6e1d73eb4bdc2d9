//! Container create/delete flows: namespace allocation, plugin invocation,
//! result decoding and in-namespace verification, correlated by container id.
//!
//! Per container the harness walks Allocated → ProvisionAttempted →
//! {Provisioned | ProvisionFailed} → Deprovisioned. A plugin-reported ADD
//! failure hands the still-allocated [`ContainerHandle`] back so the test can
//! assert on the error before destroying the namespace; a fatal error
//! (launch, timeout, protocol violation) destroys the just-allocated
//! namespace before propagating, so no path leaks the OS resource.

use std::net::IpAddr;
use std::path::Path;

use tracing::debug;

use crate::config::HarnessConfig;
use crate::decode::decode;
use crate::error::Error;
use crate::invoke::{invoke, CniCommand, InvocationEnv, PodIdentity, DEFAULT_IFNAME};
use crate::link;
use crate::netns::NsHandle;
use crate::types::{NetConf, PluginResult};

/// Characters of the namespace basename used as the derived container id.
const CONTAINER_ID_LEN: usize = 10;

/// A provisioned (or provision-attempted) container: its id, the namespace it
/// owns and the interface name inside it. The id maps 1:1 to the live
/// namespace until [`NsHandle::destroy`] runs.
#[derive(Debug)]
pub struct ContainerHandle {
    pub container_id: String,
    pub netns: NsHandle,
    pub ifname: String,
}

/// What the plugin actually left inside the namespace after a successful ADD.
#[derive(Debug, Clone)]
pub struct InterfaceState {
    pub link: link::Link,
    pub addresses: Vec<link::Address>,
    pub routes: Vec<link::RouteEntry>,
}

/// Derives a container id from a namespace's identifying path: the first
/// [`CONTAINER_ID_LEN`] characters of its basename. Create and Delete both
/// use this, so the DEL side recomputes the same id from the same path.
#[must_use]
pub fn container_id_from_path(netns_path: &Path) -> String {
    netns_path
        .file_name()
        .map(|name| name.to_string_lossy().chars().take(CONTAINER_ID_LEN).collect())
        .unwrap_or_default()
}

fn declared_version(netconf: &str) -> Result<NetConf, Error> {
    serde_json::from_str(netconf)
        .map_err(|e| Error::Protocol(format!("network configuration is not valid JSON: {e}")))
}

/// Allocates a namespace and drives ADD against it, deriving the container id
/// from the namespace path.
///
/// On success the returned [`InterfaceState`] holds the interface, its IPv4
/// addresses and its routes as observed from inside the namespace. On a
/// plugin-reported failure the state is `None` and the caller still owns the
/// namespace through the returned handle.
///
/// # Errors
///
/// Launch, timeout and protocol-violation errors abort the flow; the
/// namespace allocated for this container is destroyed first.
pub fn create_container(
    cfg: &HarnessConfig,
    netconf: &str,
    pod: Option<&PodIdentity>,
    requested_ip: Option<IpAddr>,
) -> Result<(ContainerHandle, PluginResult, Option<InterfaceState>), Error> {
    create_container_with_id(cfg, netconf, pod, requested_ip, None)
}

/// Like [`create_container`] but with an explicit container id override.
pub fn create_container_with_id(
    cfg: &HarnessConfig,
    netconf: &str,
    pod: Option<&PodIdentity>,
    requested_ip: Option<IpAddr>,
    container_id: Option<&str>,
) -> Result<(ContainerHandle, PluginResult, Option<InterfaceState>), Error> {
    let netns = NsHandle::create()?;
    let container_id = match container_id {
        Some(id) => id.to_string(),
        None => container_id_from_path(netns.path()),
    };
    let mut handle = ContainerHandle {
        container_id,
        netns,
        ifname: DEFAULT_IFNAME.to_string(),
    };

    match run_cni_add(cfg, netconf, pod, requested_ip, &handle) {
        Ok((result, state)) => Ok((handle, result, state)),
        Err(e) => {
            // A fatal ADD must not orphan the namespace we just allocated.
            if let Err(destroy_err) = handle.netns.destroy() {
                debug!(error = %destroy_err, "cleanup after failed ADD also failed");
            }
            Err(e)
        }
    }
}

/// Drives ADD for an existing container: invoke, decode, and on success
/// inspect the resulting interface from inside the namespace.
pub fn run_cni_add(
    cfg: &HarnessConfig,
    netconf: &str,
    pod: Option<&PodIdentity>,
    requested_ip: Option<IpAddr>,
    handle: &ContainerHandle,
) -> Result<(PluginResult, Option<InterfaceState>), Error> {
    let conf = declared_version(netconf)?;
    let env = InvocationEnv::new(
        CniCommand::Add,
        &handle.container_id,
        handle.netns.path(),
        Some(&handle.ifname),
        cfg.plugin_dir(),
        pod,
        requested_ip,
    );
    let output = invoke(cfg, netconf, &env)?;
    let result = decode(&output.stdout, output.exit_code, &conf.cni_version)?;

    let state = match &result {
        PluginResult::Success(_) => Some(inspect_interface(&handle.netns, &handle.ifname)?),
        PluginResult::Failure(_) => None,
    };
    Ok((result, state))
}

/// Reads the interface, its IPv4 addresses and its routes from inside the
/// namespace.
pub fn inspect_interface(netns: &NsHandle, ifname: &str) -> Result<InterfaceState, Error> {
    netns.run_in_ns(|| {
        let link = link::link_by_name(ifname)?;
        let addresses = link::addr_list_v4(&link)?;
        let routes = link::route_list_v4(&link)?;
        Ok(InterfaceState {
            link,
            addresses,
            routes,
        })
    })
}

/// Invokes DEL for the container behind `netns_path`, recomputing the
/// container id from the path the same way Create derived it.
///
/// Returns the plugin's exit code uninterpreted; repeating the call for an
/// already-deprovisioned container must terminate within the same bound.
///
/// # Errors
///
/// Launch failures and timeouts only; a non-zero plugin exit is a return
/// value here, for the caller to assert on.
pub fn delete_container(
    cfg: &HarnessConfig,
    netconf: &str,
    netns_path: &Path,
    pod: Option<&PodIdentity>,
) -> Result<i32, Error> {
    delete_container_with_id(cfg, netconf, netns_path, pod, None, None)
}

/// Like [`delete_container`] with explicit container id and interface name
/// overrides.
pub fn delete_container_with_id(
    cfg: &HarnessConfig,
    netconf: &str,
    netns_path: &Path,
    pod: Option<&PodIdentity>,
    container_id: Option<&str>,
    ifname: Option<&str>,
) -> Result<i32, Error> {
    let container_id = match container_id {
        Some(id) => id.to_string(),
        None => container_id_from_path(netns_path),
    };
    debug!(container_id = %container_id, netns = %netns_path.display(), "deleting container");

    let env = InvocationEnv::new(
        CniCommand::Del,
        &container_id,
        netns_path,
        ifname,
        cfg.plugin_dir(),
        pod,
        None,
    );
    let output = invoke(cfg, netconf, &env)?;
    Ok(output.exit_code)
}

/// Invokes the IPAM sub-plugin named by the configuration's `ipam.type`,
/// with placeholder container parameters and a caller-supplied raw
/// `CNI_ARGS` string.
///
/// Returns the decoded result and the exit code. A DEL that exits zero
/// produces no result value, matching plugins that print nothing on delete.
pub fn run_ipam_plugin(
    cfg: &HarnessConfig,
    netconf: &str,
    command: CniCommand,
    args: Option<&str>,
) -> Result<(Option<PluginResult>, i32), Error> {
    let conf = declared_version(netconf)?;
    let ipam = conf
        .ipam
        .as_ref()
        .ok_or_else(|| Error::Protocol("network configuration has no ipam section".to_string()))?;
    let ipam_cfg = cfg.for_plugin(ipam.r#type.clone());

    let env = InvocationEnv::with_raw_args(
        command,
        "a",
        Path::new("b"),
        Some("c"),
        ipam_cfg.plugin_dir(),
        args,
    );
    let output = invoke(&ipam_cfg, netconf, &env)?;

    if output.exit_code == 0 && command == CniCommand::Del {
        return Ok((None, output.exit_code));
    }
    let result = decode(&output.stdout, output.exit_code, &conf.cni_version)?;
    Ok((Some(result), output.exit_code))
}
