//! Preflight checks run before a sandbox path is touched.
//!
//! Validates host identity and live processes so a recipe fails before any
//! build output exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use ssbh::host::HostInfo;
//! use ssbh::preflight;
//!
//! let host = HostInfo::detect("/proc".into());
//! preflight::forbid_root(&host, "UNC does not support root-owned containers")?;
//! let procs = host.processes()?;
//! preflight::forbid_running(&procs, "unifi", "stop the host controller first")?;
//! ```

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::host::HostInfo;

/// Fail with `reason` when running as root.
pub fn forbid_root(host: &HostInfo, reason: &str) -> Result<()> {
    if host.is_root {
        bail!("{}", reason);
    }
    Ok(())
}

/// Fail with `reason` when a process with executable path exactly `exe`
/// is running.
pub fn forbid_running(procs: &HashSet<String>, exe: &str, reason: &str) -> Result<()> {
    if procs.contains(exe) {
        bail!("{}", reason);
    }
    Ok(())
}

/// Any process whose executable path ends in `/<name>`.
pub fn daemon_running(procs: &HashSet<String>, name: &str) -> bool {
    let suffix = format!("/{}", name);
    procs.iter().any(|p| p.ends_with(&suffix))
}

/// Any process whose rewritten title contains `needle`.
pub fn title_running(procs: &HashSet<String>, needle: &str) -> bool {
    procs.iter().any(|p| p.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn procs(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn host(is_root: bool) -> HostInfo {
        HostInfo {
            is_root,
            proc_root: PathBuf::from("/proc"),
            pointer_width: 64,
            machine: "x86_64".to_string(),
        }
    }

    #[test]
    fn test_forbid_root() {
        assert!(forbid_root(&host(false), "no root").is_ok());
        let err = forbid_root(&host(true), "no root").unwrap_err();
        assert_eq!(err.to_string(), "no root");
    }

    #[test]
    fn test_forbid_running_exact_match_only() {
        let running = procs(&["/usr/bin/unifi", "unifi-helper"]);
        assert!(forbid_running(&running, "unifi", "busy").is_ok());

        let running = procs(&["unifi"]);
        assert!(forbid_running(&running, "unifi", "busy").is_err());
    }

    #[test]
    fn test_daemon_running() {
        let running = procs(&["/usr/sbin/haveged", "/sbin/init"]);
        assert!(daemon_running(&running, "haveged"));
        assert!(!daemon_running(&procs(&["haveged"]), "haveged"));
    }

    #[test]
    fn test_title_running() {
        let running = procs(&["avahi-daemon: running [box.local]"]);
        assert!(title_running(&running, "avahi-daemon:"));
        assert!(!title_running(&procs(&["/usr/sbin/avahi-daemon"]), "avahi-daemon:"));
    }
}
