//! UniFi Network Controller (UNC) on Ubuntu.
//!
//! Upstream packages: <https://help.ui.com/hc/en-us/articles/220066768>

use anyhow::Result;

use super::BuildEnv;
use crate::distro::{DistroBuild, DistroOptions, Ubuntu};
use crate::host::HostInfo;
use crate::preflight;

/// Ubuntu 20.04.
pub const DEFAULT_TAG: &str = "focal";

/// Ubuntu 16.04, for 32-bit ARM where the bundled MongoDB misbehaves on
/// newer releases.
pub const ARMHF_TAG: &str = "xenial";

const PACKAGES: &str = "dialog less logrotate procps apt-transport-https \
                        ca-certificates gnupg wget mongodb-server";

const KEYSERVER: &str = "keyserver.ubuntu.com";
const SIGNING_KEY: &str = "06E85760C0A52C50";
const SOURCES_FILE: &str = "etc/apt/sources.list.d/100-ubnt-unifi.list";
const SOURCES_LINE: &str = "deb https://www.ui.com/downloads/unifi/debian stable ubiquiti";

/// Host state gathered before anything is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prechecks {
    /// An entropy daemon is running on the host.
    pub haveged: bool,
}

/// Refuse root and a running controller; note whether `haveged` runs.
pub fn precheck(host: &HostInfo) -> Result<Prechecks> {
    preflight::forbid_root(host, "UNC does not support root-owned containers")?;
    let procs = host.processes()?;
    preflight::forbid_running(
        &procs,
        "unifi",
        "UNC requires all existing running versions on this host to be stopped before installing",
    )?;
    let haveged = preflight::daemon_running(&procs, "haveged");
    tracing::debug!(haveged, "UNC prechecks passed");
    Ok(Prechecks { haveged })
}

/// Ubuntu release for this host.
pub fn release_tag(host: &HostInfo) -> &'static str {
    if host.is_32bit_arm() {
        ARMHF_TAG
    } else {
        DEFAULT_TAG
    }
}

/// Build the controller sandbox at `image_path`.
pub fn build(env: &BuildEnv, image_path: &str) -> Result<()> {
    let checks = precheck(&env.host)?;
    let tag = release_tag(&env.host);

    let opts = DistroOptions {
        tag: tag.to_string(),
        upgrade: true,
        ..DistroOptions::default()
    }
    .with_packages(PACKAGES);
    let sandbox = env.sandbox(image_path)?;
    let mut distro = DistroBuild::new(Ubuntu, opts, sandbox);
    distro.run()?;

    println!("# Adding UniFi key and the UNC apt repository");
    distro.sandbox().exec(
        format!("apt-key adv --keyserver {} --recv {}", KEYSERVER, SIGNING_KEY).as_str(),
    )?;
    distro
        .sandbox()
        .write_file(SOURCES_FILE, [SOURCES_LINE], 0o644)?;
    // The new source has to be indexed before unifi can be found.
    distro.refresh()?;
    if tag != ARMHF_TAG {
        distro.sandbox().exec("apt-mark hold openjdk-1?-*")?;
    }
    distro.install_packages(&["openjdk-8-jre-headless", "unifi"])?;
    distro.sandbox().exec("apt autoremove -y")?;

    let sb = distro.sandbox();
    let tool = sb.tool().name();
    println!();
    if !checks.haveged {
        println!(
            "WARNING: UNC requires the \"haveged\" daemon on headless hosts to generate sufficient entropy"
        );
    }
    println!("# UNC runs on https://localhost:8443");
    println!("# Start:");
    println!(
        "#   {} exec -fw {} /etc/init.d/unifi start",
        tool,
        sb.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::testing::env_for;
    use crate::sandbox::testing::FakeTool;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn fake_proc(bins: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (i, bin) in bins.iter().enumerate() {
            let pid = temp.path().join((i + 100).to_string());
            fs::create_dir_all(&pid).unwrap();
            fs::write(pid.join("cmdline"), format!("{bin}\0")).unwrap();
        }
        temp
    }

    fn host(pointer_width: u32, machine: &str, proc_root: &Path) -> HostInfo {
        HostInfo {
            is_root: false,
            proc_root: PathBuf::from(proc_root),
            pointer_width,
            machine: machine.to_string(),
        }
    }

    #[test]
    fn test_release_tag() {
        let procs = fake_proc(&[]);
        assert_eq!(release_tag(&host(32, "armv7l", procs.path())), ARMHF_TAG);
        assert_eq!(release_tag(&host(64, "aarch64", procs.path())), DEFAULT_TAG);
        assert_eq!(release_tag(&host(64, "x86_64", procs.path())), DEFAULT_TAG);
    }

    #[test]
    fn test_precheck_haveged() {
        let procs = fake_proc(&["/usr/sbin/haveged"]);
        let checks = precheck(&host(64, "x86_64", procs.path())).unwrap();
        assert!(checks.haveged);

        let procs = fake_proc(&["/sbin/init"]);
        let checks = precheck(&host(64, "x86_64", procs.path())).unwrap();
        assert!(!checks.haveged);
    }

    #[test]
    fn test_running_controller_blocks_build() {
        let fake = FakeTool::new();
        let procs = fake_proc(&["unifi", "/usr/sbin/haveged"]);
        let env = env_for(&fake, procs.path(), false);
        let target = fake.target("unc");

        let err = build(&env, &target).unwrap_err();

        assert!(err.to_string().contains("stopped before installing"));
        assert!(!Path::new(&target).exists());
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_root_blocks_build() {
        let fake = FakeTool::new();
        let procs = fake_proc(&[]);
        let env = env_for(&fake, procs.path(), true);
        let target = fake.target("unc");

        let err = build(&env, &target).unwrap_err();

        assert!(err.to_string().contains("root-owned"));
        assert!(!Path::new(&target).exists());
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_build_sequence() {
        let fake = FakeTool::new();
        let procs = fake_proc(&["/usr/sbin/haveged"]);
        let env = env_for(&fake, procs.path(), false);
        let target = fake.target("unc");

        build(&env, &target).unwrap();

        assert!(fake.calls()[0].ends_with("docker://ubuntu:focal"));
        assert_eq!(
            fake.execs(),
            [
                "apt -y update",
                "apt -y install dialog less logrotate procps apt-transport-https \
                 ca-certificates gnupg wget mongodb-server nano",
                "apt -y upgrade",
                "apt-key adv --keyserver keyserver.ubuntu.com --recv 06E85760C0A52C50",
                "apt -y update",
                "apt-mark hold openjdk-1?-*",
                "apt -y install openjdk-8-jre-headless unifi",
                "apt autoremove -y",
            ]
        );
        let sources = fs::read_to_string(Path::new(&target).join(SOURCES_FILE)).unwrap();
        assert_eq!(sources, format!("{SOURCES_LINE}\n"));
    }

    #[test]
    fn test_armhf_skips_java_hold() {
        let fake = FakeTool::new();
        let procs = fake_proc(&[]);
        let mut env = env_for(&fake, procs.path(), false);
        env.host.pointer_width = 32;
        env.host.machine = "armv7l".to_string();
        let target = fake.target("unc");

        build(&env, &target).unwrap();

        assert!(fake.calls()[0].ends_with("docker://ubuntu:xenial"));
        assert!(!fake.execs().iter().any(|c| c.starts_with("apt-mark")));
    }
}
