//! cni-harness drives a CNI plugin binary as an external process and verifies
//! the network state it leaves behind.
//!
//! The harness owns the runtime side of the [CNI protocol](https://www.cni.dev/):
//! it builds the protocol environment (`CNI_COMMAND`, `CNI_CONTAINERID`, ...),
//! feeds the network configuration to the plugin on stdin, bounds the wait on
//! the subprocess, and decodes the version-dependent result schema. On top of
//! that it manages OS network namespaces and veth pairs so a test can observe
//! the interfaces, addresses and routes a plugin actually provisioned.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cni_harness::config::HarnessConfig;
//! use cni_harness::lifecycle;
//!
//! let netconf = r#"{"cniVersion":"0.3.1","name":"test","type":"examplecni",
//!                   "ipam":{"type":"host-local","subnet":"10.0.0.0/24"}}"#;
//!
//! let cfg = HarnessConfig::from_env().expect("BIN and PLUGIN must be set");
//! let (handle, result, state) =
//!     lifecycle::create_container(&cfg, netconf, None, None).expect("ADD failed");
//!
//! assert!(result.is_success());
//! assert_eq!(state.expect("inspectable").link.name, "eth0");
//!
//! let netns_path = handle.netns.path().to_path_buf();
//! lifecycle::delete_container(&cfg, netconf, &netns_path, None).expect("DEL failed");
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod invoke;
pub mod lifecycle;
pub mod link;
pub mod netns;
pub mod types;
pub mod veth;
pub mod version;

mod util;
