//! Fedora package verbs (dnf).

use anyhow::Result;

use super::PackageManager;
use crate::sandbox::Sandbox;

/// Fedora, `docker://fedora:<tag>`.
///
/// dnf refreshes its metadata on demand, so there is no separate update.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fedora;

impl PackageManager for Fedora {
    fn image(&self) -> &'static str {
        "fedora"
    }

    fn update(&self, _sb: &Sandbox) -> Result<()> {
        Ok(())
    }

    fn upgrade(&self, sb: &Sandbox) -> Result<()> {
        sb.exec("dnf -y upgrade")
    }

    fn install(&self, sb: &Sandbox, pkgs: &[String]) -> Result<()> {
        let mut cmd = vec!["dnf".to_string(), "-y".to_string(), "install".to_string()];
        cmd.extend(pkgs.iter().cloned());
        sb.exec(cmd)
    }
}
