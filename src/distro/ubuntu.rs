//! Ubuntu package verbs (apt).

use anyhow::Result;

use super::PackageManager;
use crate::sandbox::Sandbox;

/// Ubuntu, `docker://ubuntu:<tag>`. Base of both application recipes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ubuntu;

impl PackageManager for Ubuntu {
    fn image(&self) -> &'static str {
        "ubuntu"
    }

    fn update(&self, sb: &Sandbox) -> Result<()> {
        sb.exec("apt -y update")
    }

    fn upgrade(&self, sb: &Sandbox) -> Result<()> {
        sb.exec("apt -y upgrade")
    }

    fn install(&self, sb: &Sandbox, pkgs: &[String]) -> Result<()> {
        let mut cmd = vec!["apt".to_string(), "-y".to_string(), "install".to_string()];
        cmd.extend(pkgs.iter().cloned());
        sb.exec(cmd)
    }
}
