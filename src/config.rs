//! Harness configuration.
//!
//! The plugin binary is resolved outside the protocol core: the search
//! directory and binary name come from the `BIN` and `PLUGIN` environment
//! variables (the convention the harness's callers already use), or are set
//! programmatically. The search directory doubles as the `CNI_PATH` value of
//! every invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::util::get_env;

/// Environment variable naming the plugin search directory.
pub const BIN_ENV: &str = "BIN";
/// Environment variable naming the plugin binary inside the search directory.
pub const PLUGIN_ENV: &str = "PLUGIN";

/// Hard bound on a single plugin invocation.
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory searched for plugin executables; exported as `CNI_PATH`.
    pub plugin_dir: PathBuf,
    /// Plugin binary name, joined onto `plugin_dir` at launch time.
    pub plugin_name: String,
    /// Wait bound for every invocation. Exceeding it is fatal, never retried.
    pub timeout: Duration,
}

impl HarnessConfig {
    #[must_use]
    pub fn new(plugin_dir: impl Into<PathBuf>, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            plugin_name: plugin_name.into(),
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }

    /// Reads `BIN` and `PLUGIN` from the environment.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when either variable is unset.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(
            get_env::<String>(BIN_ENV)?,
            get_env::<String>(PLUGIN_ENV)?,
        ))
    }

    /// Overrides the invocation wait bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a copy of this configuration targeting a different binary in
    /// the same search directory. Used to reach the IPAM sub-plugin named by
    /// a configuration's `ipam.type`.
    #[must_use]
    pub fn for_plugin(&self, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_dir: self.plugin_dir.clone(),
            plugin_name: plugin_name.into(),
            timeout: self.timeout,
        }
    }

    /// Full path of the plugin executable.
    #[must_use]
    pub fn plugin_path(&self) -> PathBuf {
        self.plugin_dir.join(&self.plugin_name)
    }

    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_path_joins_dir_and_name() {
        let cfg = HarnessConfig::new("/opt/cni/bin", "examplecni");
        assert_eq!(cfg.plugin_path(), PathBuf::from("/opt/cni/bin/examplecni"));
        assert_eq!(cfg.timeout, DEFAULT_PLUGIN_TIMEOUT);
    }

    #[test]
    fn for_plugin_retargets_binary_only() {
        let cfg = HarnessConfig::new("/opt/cni/bin", "examplecni")
            .with_timeout(Duration::from_secs(1));
        let ipam = cfg.for_plugin("host-local");
        assert_eq!(ipam.plugin_dir, cfg.plugin_dir);
        assert_eq!(ipam.plugin_name, "host-local");
        assert_eq!(ipam.timeout, Duration::from_secs(1));
    }

    #[test]
    fn from_env_reads_bin_and_plugin() {
        std::env::set_var(BIN_ENV, "/tmp/cni-bin");
        std::env::set_var(PLUGIN_ENV, "examplecni");
        let cfg = HarnessConfig::from_env().unwrap();
        assert_eq!(cfg.plugin_dir, PathBuf::from("/tmp/cni-bin"));
        assert_eq!(cfg.plugin_name, "examplecni");
        std::env::remove_var(BIN_ENV);
        std::env::remove_var(PLUGIN_ENV);

        assert!(HarnessConfig::from_env().is_err());
    }
}
