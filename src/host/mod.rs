//! Host facts consulted by the build recipes.
//!
//! - [`proc`] - live process executables
//! - [`os_release`] - distribution identity of a filesystem tree
//!
//! [`HostInfo`] bundles the identity and architecture facts so recipes can
//! be exercised against a synthetic host.

pub mod os_release;
pub mod proc;

use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;

pub use os_release::{LookupMode, OsRelease};

/// Identity, architecture and process root of the host running the build.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Effective user is root.
    pub is_root: bool,
    /// Root of the process-information tree.
    pub proc_root: PathBuf,
    /// Word width of this program, in bits.
    pub pointer_width: u32,
    /// Kernel machine name (`uname -m`).
    pub machine: String,
}

impl HostInfo {
    /// Detect facts for the running host.
    pub fn detect(proc_root: PathBuf) -> Self {
        let is_root = nix::unistd::geteuid().is_root();
        let pointer_width = if cfg!(target_pointer_width = "32") {
            32
        } else {
            64
        };
        let info = Self {
            is_root,
            proc_root,
            pointer_width,
            machine: machine(),
        };
        tracing::debug!(?info, "detected host");
        info
    }

    /// Fresh snapshot of running executables.
    pub fn processes(&self) -> Result<HashSet<String>> {
        proc::snapshot(&self.proc_root)
    }

    /// 32-bit userland on an ARM kernel (armhf).
    pub fn is_32bit_arm(&self) -> bool {
        self.pointer_width == 32 && self.machine.starts_with("arm")
    }
}

fn machine() -> String {
    match nix::sys::utsname::uname() {
        Ok(uts) => uts.machine().to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "uname failed, using build architecture");
            std::env::consts::ARCH.to_string()
        }
    }
}
