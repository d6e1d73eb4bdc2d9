//! Harness error taxonomy.
//!
//! The harness distinguishes four failure categories when driving a plugin:
//!
//! - **Launch failure**: the binary could not be started or its stdin stream
//!   broke. Fatal for the current test case.
//! - **Timeout**: the plugin did not exit within the wait bound. Fatal, never
//!   retried.
//! - **Protocol violation**: the plugin exited but its output does not match
//!   the schema its exit code promises. Fatal.
//! - **Plugin-reported failure**: a non-zero exit with a well-formed error
//!   body. This one is *not* an [`Error`]; it is surfaced as a normal value
//!   ([`crate::types::PluginResult::Failure`]) so tests can assert on it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The plugin process could not be launched or fed its configuration.
    #[error("failed to launch plugin {path}: {reason}")]
    Launch { path: PathBuf, reason: String },

    /// The plugin did not terminate within the invocation wait bound.
    #[error("plugin did not exit within {0:?}")]
    Timeout(Duration),

    /// The plugin's output violates the CNI result contract for its exit code.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The configuration declares a CNI version the harness cannot decode.
    #[error("unsupported CNI version: {0}")]
    UnsupportedVersion(String),

    /// A network namespace could not be created, entered or removed.
    #[error("network namespace failure: {0}")]
    Namespace(String),

    /// A netlink operation (link, address or route) failed.
    #[error("netlink failure: {0}")]
    Netlink(String),

    /// No link with the given name exists in the active namespace.
    #[error("link {0} not found")]
    LinkNotFound(String),

    /// Harness configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}
