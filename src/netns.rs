//! Network namespace lifecycle and scoped execution.
//!
//! A [`NsHandle`] owns exactly one OS network namespace. Code runs inside it
//! through [`NsHandle::run_in_ns`], which pins the context switch to a
//! dedicated thread and restores the previous namespace on every exit path
//! via a drop guard — switching is scoped acquisition, never a permanent
//! change of ambient state. Destruction is idempotent, and `Drop` contains
//! leaks from test paths that never reach an explicit destroy.

use std::path::{Path, PathBuf};

use netns_rs::NetNs;
use tracing::{debug, warn};

use crate::error::Error;
use crate::link;
use crate::util::random_suffix;

/// Name prefix of harness-allocated namespaces under the system netns run
/// directory.
pub const NETNS_PREFIX: &str = "cnitest-";

/// Owner of one OS network namespace.
///
/// The namespace is released exactly once: either by [`NsHandle::destroy`] or
/// by `Drop`, whichever comes first.
#[derive(Debug)]
pub struct NsHandle {
    ns: Option<NetNs>,
    name: String,
    path: PathBuf,
}

impl NsHandle {
    /// Allocates a fresh, uniquely named network namespace and brings its
    /// loopback interface up.
    ///
    /// # Errors
    ///
    /// [`Error::Namespace`] when the OS resource cannot be allocated (this
    /// requires `CAP_SYS_ADMIN`), or when loopback setup fails — in which
    /// case the half-built namespace is released before returning.
    pub fn create() -> Result<Self, Error> {
        let name = format!("{NETNS_PREFIX}{}", random_suffix());
        let ns = NetNs::new(&name)
            .map_err(|e| Error::Namespace(format!("creating {name}: {e}")))?;
        let path = ns.path().to_path_buf();
        debug!(name = %name, path = %path.display(), "created network namespace");

        let mut handle = Self {
            ns: Some(ns),
            name,
            path,
        };
        if let Err(e) = handle.run_in_ns(|| link::set_link_up("lo")) {
            let _ = handle.destroy();
            return Err(e);
        }
        Ok(handle)
    }

    /// The namespace's identifying path (`/var/run/netns/<name>`), also valid
    /// after destruction for DEL-side bookkeeping.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` with this namespace as the active network context.
    ///
    /// The switch happens on a dedicated thread so it can never overlap with
    /// another switch on a shared OS thread; the thread's previous context is
    /// restored whether `f` returns, fails, or panics.
    ///
    /// # Errors
    ///
    /// [`Error::Namespace`] when the handle is already destroyed or the
    /// context switch itself fails; otherwise whatever `f` returns.
    pub fn run_in_ns<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error> + Send,
        T: Send,
    {
        let ns = self
            .ns
            .as_ref()
            .ok_or_else(|| Error::Namespace(format!("{} is already destroyed", self.name)))?;

        std::thread::scope(|scope| {
            scope
                .spawn(move || {
                    let _guard = NsGuard::enter(ns)?;
                    f()
                })
                .join()
                .map_err(|_| Error::Namespace("namespace worker thread panicked".to_string()))?
        })
    }

    /// Releases the OS resource. Idempotent: destroying an already-destroyed
    /// handle is a no-op, not an error.
    pub fn destroy(&mut self) -> Result<(), Error> {
        match self.ns.take() {
            Some(ns) => {
                debug!(name = %self.name, "destroying network namespace");
                ns.remove()
                    .map_err(|e| Error::Namespace(format!("removing {}: {e}", self.name)))
            }
            None => Ok(()),
        }
    }
}

impl Drop for NsHandle {
    fn drop(&mut self) {
        if self.ns.is_some() {
            if let Err(e) = self.destroy() {
                warn!(name = %self.name, error = %e, "leaking network namespace");
            }
        }
    }
}

/// Scoped context switch: entering acquires, dropping restores.
struct NsGuard {
    prev: NetNs,
}

impl NsGuard {
    fn enter(target: &NetNs) -> Result<Self, Error> {
        let prev = netns_rs::get_from_current_thread()
            .map_err(|e| Error::Namespace(format!("reading current namespace: {e}")))?;
        target
            .enter()
            .map_err(|e| Error::Namespace(format!("entering namespace: {e}")))?;
        Ok(Self { prev })
    }
}

impl Drop for NsGuard {
    fn drop(&mut self) {
        if let Err(e) = self.prev.enter() {
            // The worker thread is about to die anyway, but say so.
            warn!(error = %e, "failed to restore previous network namespace");
        }
    }
}
