//! Homebridge on Ubuntu with Node.js LTS and the config UI.
//!
//! Upstream guide: <https://github.com/homebridge/homebridge/wiki/Install-Homebridge-on-Debian-or-Ubuntu-Linux>

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;

use super::BuildEnv;
use crate::distro::{DistroBuild, DistroOptions, Ubuntu};
use crate::preflight;
use crate::sandbox::Sandbox;

/// Ubuntu 20.04.
pub const TAG: &str = "focal";

const PACKAGES: &str = "dialog less gcc g++ make python net-tools wget";
const AVAHI: &str = "avahi-daemon";

const NODE_SETUP_URL: &str = "https://deb.nodesource.com/setup_16.x";
const NODE_SETUP_SCRIPT: &str = "/nodejs_lts_installer.bash";

/// Config written by `hb-service install`, relative to the sandbox.
pub const SERVICE_CONFIG: &str = "var/lib/homebridge/config.json";
/// Staging location; written directly, outside the overlaid home.
pub const STAGED_CONFIG: &str = "/homebridge_config.json";
/// Final location, only reachable through `exec`.
pub const HOME_CONFIG: &str = "/root/.homebridge/config.json";
pub const LOG_FILE: &str = "/tmp/homebridge.log";

/// Build the Homebridge sandbox at `image_path`.
pub fn build(env: &BuildEnv, image_path: &str) -> Result<()> {
    let procs = env.host.processes()?;
    let host_avahi = preflight::title_running(&procs, "avahi-daemon:");

    let mut pkgs = PACKAGES.to_string();
    if !host_avahi {
        pkgs.push(' ');
        pkgs.push_str(AVAHI);
    }
    let opts = DistroOptions {
        tag: TAG.to_string(),
        upgrade: true,
        ..DistroOptions::default()
    }
    .with_packages(&pkgs);
    let sandbox = env.sandbox(image_path)?;
    let mut distro = DistroBuild::new(Ubuntu, opts, sandbox);
    distro.run()?;

    println!("# Node.js install LTS release");
    let sb = distro.sandbox();
    sb.exec(format!("wget -O {} {}", NODE_SETUP_SCRIPT, NODE_SETUP_URL).as_str())?;
    sb.exec(["bash", NODE_SETUP_SCRIPT])?;
    distro.install_packages(&["nodejs"])?;
    sb.exec("npm install --global --unsafe-perm homebridge homebridge-config-ui-x")?;
    sb.exec("hb-service install --user root")?;

    let home = sb.path().join("root/.homebridge");
    fs::create_dir_all(&home).with_context(|| format!("creating '{}'", home.display()))?;

    println!("# config.json setup and manual log addition");
    configure_logging(sb)?;

    let tool = sb.tool().name();
    let path = sb.path().display();
    println!();
    println!("# Homebridge runs on http://localhost:8581/login");
    println!("#   user: admin / password: admin");
    println!("# Update:");
    println!("#   {} exec -fw {} hb-service update-node", tool, path);
    println!("# Start:");
    if !host_avahi {
        println!("#   {} exec -fw {} /etc/init.d/dbus restart", tool, path);
        println!("#   {} exec -fw {} /etc/init.d/avahi-daemon restart", tool, path);
    }
    println!(
        "#   ({} exec -fw {} homebridge | tee -a {}) &",
        tool, path, LOG_FILE
    );
    Ok(())
}

/// Add file logging to the service config and move it into the home
/// directory.
///
/// The home directory is an overlay that only exists during `exec`, so the
/// file is staged at the sandbox root and moved from inside.
pub fn configure_logging(sb: &Sandbox) -> Result<()> {
    let src = sb.path().join(SERVICE_CONFIG);
    let raw = fs::read_to_string(&src).with_context(|| format!("reading '{}'", src.display()))?;
    let mut config: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing '{}'", src.display()))?;

    inject_file_logging(&mut config)?;

    sb.write_file(STAGED_CONFIG, render(&config)?, 0o644)?;
    sb.exec(["mv", "-v", STAGED_CONFIG, HOME_CONFIG])
}

/// Set `log` on the `platforms` entry whose `platform` is `"config"`.
pub fn inject_file_logging(config: &mut Value) -> Result<()> {
    let Some(platforms) = config.get_mut("platforms").and_then(Value::as_array_mut) else {
        bail!("config.json has no 'platforms' list");
    };
    let Some(entry) = platforms
        .iter_mut()
        .find(|p| p.get("platform").and_then(Value::as_str) == Some("config"))
    else {
        bail!("unable to add logging to config.json");
    };
    let Some(entry) = entry.as_object_mut() else {
        bail!("unable to add logging to config.json");
    };
    entry.insert(
        "log".to_string(),
        json!({ "method": "file", "path": LOG_FILE }),
    );
    Ok(())
}

/// Sorted keys, four-space indent.
fn render(config: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}
