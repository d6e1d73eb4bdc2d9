//! Plugin invocation: protocol environment assembly and bounded subprocess
//! execution.
//!
//! One invocation is: build an [`InvocationEnv`], launch the plugin binary
//! with that environment, write the network configuration to its stdin
//! followed by a newline, close stdin, and wait — never longer than the
//! configured bound. The invoker hands back raw stdout bytes and the exit
//! code without interpreting either; [`crate::decode`] owns interpretation.

use std::net::IpAddr;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::Error;
use crate::link;

pub(crate) const CNI_COMMAND: &str = "CNI_COMMAND";
pub(crate) const CNI_CONTAINERID: &str = "CNI_CONTAINERID";
pub(crate) const CNI_NETNS: &str = "CNI_NETNS";
pub(crate) const CNI_IFNAME: &str = "CNI_IFNAME";
pub(crate) const CNI_ARGS: &str = "CNI_ARGS";
pub(crate) const CNI_PATH: &str = "CNI_PATH";

/// Interface name used when the caller does not pick one.
pub const DEFAULT_IFNAME: &str = "eth0";

/// Placeholder infra-container id carried in `CNI_ARGS` alongside pod
/// identity; the plugins under test never dereference it.
const INFRA_CONTAINER_ID: &str = "whatever";

/// The CNI operations the harness drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CniCommand {
    Add,
    Del,
}

impl CniCommand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CniCommand::Add => "ADD",
            CniCommand::Del => "DEL",
        }
    }
}

/// Pod identity encoded into `CNI_ARGS` for plugins that resolve workloads
/// through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodIdentity {
    pub name: String,
    pub namespace: String,
}

impl PodIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// The protocol environment of a single invocation. Built once, then
/// read-only; a fresh instance is constructed per call.
#[derive(Debug, Clone)]
pub struct InvocationEnv {
    vars: Vec<(String, String)>,
}

impl InvocationEnv {
    /// Builds the environment for one `command` against `netns_path`.
    ///
    /// `CNI_ARGS` is only present when `pod` is given: it encodes the pod
    /// name, pod namespace and the fixed infra-container id, and appends
    /// `IP=<addr>` when `requested_ip` is also given.
    #[must_use]
    pub fn new(
        command: CniCommand,
        container_id: &str,
        netns_path: &Path,
        ifname: Option<&str>,
        plugin_dir: &Path,
        pod: Option<&PodIdentity>,
        requested_ip: Option<IpAddr>,
    ) -> Self {
        let args = pod.map(|pod| {
            let mut args = format!(
                "K8S_POD_NAME={};K8S_POD_NAMESPACE={};K8S_POD_INFRA_CONTAINER_ID={}",
                pod.name, pod.namespace, INFRA_CONTAINER_ID
            );
            if let Some(ip) = requested_ip {
                args.push_str(&format!(";IP={ip}"));
            }
            args
        });
        Self::build(command, container_id, netns_path, ifname, plugin_dir, args)
    }

    /// Builds an environment with a caller-supplied raw `CNI_ARGS` string.
    /// Used for IPAM sub-plugin invocations, which take opaque args.
    #[must_use]
    pub fn with_raw_args(
        command: CniCommand,
        container_id: &str,
        netns_path: &Path,
        ifname: Option<&str>,
        plugin_dir: &Path,
        args: Option<&str>,
    ) -> Self {
        Self::build(
            command,
            container_id,
            netns_path,
            ifname,
            plugin_dir,
            args.map(str::to_string),
        )
    }

    fn build(
        command: CniCommand,
        container_id: &str,
        netns_path: &Path,
        ifname: Option<&str>,
        plugin_dir: &Path,
        args: Option<String>,
    ) -> Self {
        let mut vars = vec![
            (CNI_COMMAND.to_string(), command.as_str().to_string()),
            (CNI_CONTAINERID.to_string(), container_id.to_string()),
            (
                CNI_NETNS.to_string(),
                netns_path.to_string_lossy().to_string(),
            ),
            (
                CNI_IFNAME.to_string(),
                ifname.unwrap_or(DEFAULT_IFNAME).to_string(),
            ),
            (
                CNI_PATH.to_string(),
                plugin_dir.to_string_lossy().to_string(),
            ),
        ];
        if let Some(args) = args {
            vars.push((CNI_ARGS.to_string(), args));
        }
        Self { vars }
    }

    /// The variables of this invocation, in protocol order.
    #[must_use]
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Looks up a single variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw capture of one completed plugin invocation.
#[derive(Debug)]
pub struct InvokeOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Process exit code; -1 when the process was terminated by a signal.
    pub exit_code: i32,
}

/// Launches the configured plugin, feeds it `netconf`, and waits.
///
/// The configuration document is written to stdin followed by a line
/// terminator, then the stream is closed before waiting. Whatever the plugin
/// exits with inside the bound is returned verbatim; the exit code is never
/// interpreted here.
///
/// # Errors
///
/// [`Error::Launch`] when the binary cannot be started or stdin breaks,
/// [`Error::Timeout`] when the process outlives `cfg.timeout`. The timed-out
/// process is killed, not awaited further.
pub fn invoke(
    cfg: &HarnessConfig,
    netconf: &str,
    env: &InvocationEnv,
) -> Result<InvokeOutput, Error> {
    let path = cfg.plugin_path();
    debug!(path = %path.display(), vars = ?env.vars(), "invoking CNI plugin");

    let launch = |reason: String| Error::Launch {
        path: path.clone(),
        reason,
    };

    link::runtime()?.block_on(async {
        let mut cmd = tokio::process::Command::new(&path);
        cmd.envs(env.vars().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| launch(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch("stdin was not captured".to_string()))?;
        stdin
            .write_all(netconf.as_bytes())
            .await
            .map_err(|e| launch(format!("writing netconf to stdin: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| launch(format!("terminating stdin: {e}")))?;
        // Dropping the handle closes the stream before we start waiting.
        drop(stdin);

        let output = tokio::time::timeout(cfg.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(cfg.timeout))?
            .map_err(|e| launch(format!("waiting for plugin: {e}")))?;

        Ok(InvokeOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    })
}
