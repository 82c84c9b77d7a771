//! Alpine Linux package verbs (apk).

use anyhow::Result;

use super::PackageManager;
use crate::sandbox::Sandbox;

/// Alpine Linux, `docker://alpine:<tag>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alpine;

impl PackageManager for Alpine {
    fn image(&self) -> &'static str {
        "alpine"
    }

    fn update(&self, sb: &Sandbox) -> Result<()> {
        sb.exec("apk update")
    }

    fn upgrade(&self, sb: &Sandbox) -> Result<()> {
        sb.exec("apk upgrade")
    }

    fn install(&self, sb: &Sandbox, pkgs: &[String]) -> Result<()> {
        let mut cmd = vec!["apk".to_string(), "add".to_string()];
        cmd.extend(pkgs.iter().cloned());
        sb.exec(cmd)
    }
}
