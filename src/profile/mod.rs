//! Build targets and their `key=value` options.
//!
//! A target is either a bare distro ([`Target::Alpine`], [`Target::Fedora`],
//! [`Target::Ubuntu`]) or an application recipe built on Ubuntu
//! ([`Target::Unc`], [`Target::Hb`]).

pub mod homebridge;
pub mod unifi;

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::distro::{Alpine, DistroBuild, DistroOptions, Fedora, PackageManager, Step, Ubuntu};
use crate::host::HostInfo;
use crate::sandbox::{BuildTool, Sandbox};

/// Supported build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Target {
    Alpine,
    Fedora,
    Ubuntu,
    /// UniFi Network Controller
    Unc,
    /// Homebridge
    Hb,
}

impl Target {
    pub const ALL: &'static [Target] = &[
        Target::Alpine,
        Target::Fedora,
        Target::Ubuntu,
        Target::Unc,
        Target::Hb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Alpine => "alpine",
            Target::Fedora => "fedora",
            Target::Ubuntu => "ubuntu",
            Target::Unc => "unc",
            Target::Hb => "hb",
        }
    }

    /// Recognized options, for `--list`.
    pub fn options(self) -> &'static str {
        match self {
            Target::Alpine | Target::Fedora | Target::Ubuntu => {
                "tag=str, pkgs=str, upgrade=bool, extras=str"
            }
            Target::Unc | Target::Hb => "",
        }
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Target::ALL.iter().find(|t| t.name() == s) {
            Some(t) => Ok(*t),
            None => bail!(
                "unsupported target '{}'; expected one of: {}",
                s,
                Target::ALL
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `--list` lines, sorted by target name.
pub fn list() -> Vec<String> {
    let mut targets = Target::ALL.to_vec();
    targets.sort_by_key(|t| t.name());
    targets
        .into_iter()
        .map(|t| format!("{:20} {}", t.name(), t.options()).trim_end().to_string())
        .collect()
}

/// Value of one `-o key=value` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
}

/// Parsed `-o key=value` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    values: BTreeMap<String, OptionValue>,
}

impl BuildOptions {
    /// Parse raw `key=value` strings. Entries without `=` are ignored;
    /// later keys win. `upgrade` is coerced to a boolean.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut values = BTreeMap::new();
        for kv in raw {
            let Some((key, value)) = kv.as_ref().split_once('=') else {
                tracing::debug!(option = kv.as_ref(), "ignoring option without '='");
                continue;
            };
            let value = if key == "upgrade" {
                OptionValue::Bool(parse_bool(value))
            } else {
                OptionValue::Str(value.to_string())
            };
            values.insert(key.to_string(), value);
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    fn take_str(&mut self, key: &str) -> Result<Option<String>> {
        match self.values.remove(key) {
            None => Ok(None),
            Some(OptionValue::Str(v)) => Ok(Some(v)),
            Some(OptionValue::Bool(_)) => bail!("option '{}' expects a string", key),
        }
    }

    fn take_bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.values.remove(key) {
            None => Ok(None),
            Some(OptionValue::Bool(v)) => Ok(Some(v)),
            Some(OptionValue::Str(_)) => bail!("option '{}' expects a boolean", key),
        }
    }

    /// Fail on the first option nobody consumed.
    fn finish(self) -> Result<()> {
        if let Some(key) = self.values.keys().next() {
            bail!("unexpected option '{}'", key);
        }
        Ok(())
    }
}

/// `y`, `yes`, `t` and `true` (any case) are true; anything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "y" | "yes" | "t" | "true")
}

/// Host, configuration and tool shared by every recipe.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub host: HostInfo,
    pub config: Config,
    tool: Option<BuildTool>,
}

impl BuildEnv {
    pub fn new(host: HostInfo, config: Config) -> Self {
        Self {
            host,
            config,
            tool: None,
        }
    }

    /// Skip tool resolution and use `tool`.
    pub fn with_tool(mut self, tool: BuildTool) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Validate `image_path` and attach the build tool.
    pub fn sandbox(&self, image_path: &str) -> Result<Sandbox> {
        match &self.tool {
            Some(tool) => {
                let mut sb = Sandbox::with_tool(image_path, tool.clone())?;
                sb.set_localtime_source(self.config.localtime.clone());
                Ok(sb)
            }
            None => Sandbox::create(image_path, &self.config),
        }
    }
}

/// Build `target` at `image_path` (default: the target name).
pub fn build(
    target: Target,
    image_path: Option<&str>,
    opts: BuildOptions,
    env: &BuildEnv,
) -> Result<()> {
    let image_path = image_path_or_default(target, image_path);
    tracing::debug!(%target, image_path, ?opts, "building target");

    match target {
        Target::Alpine => build_distro(Alpine, image_path, opts, env),
        Target::Fedora => build_distro(Fedora, image_path, opts, env),
        Target::Ubuntu => build_distro(Ubuntu, image_path, opts, env),
        Target::Unc => {
            opts.finish()?;
            unifi::build(env, image_path)
        }
        Target::Hb => {
            opts.finish()?;
            homebridge::build(env, image_path)
        }
    }
}

/// Sandbox path to build at; an absent or empty path means the target name
/// in the current directory.
pub fn image_path_or_default(target: Target, image_path: Option<&str>) -> &str {
    image_path.filter(|p| !p.is_empty()).unwrap_or(target.name())
}

fn build_distro<P: PackageManager>(
    pm: P,
    image_path: &str,
    mut opts: BuildOptions,
    env: &BuildEnv,
) -> Result<()> {
    let mut distro = DistroOptions::default();
    if let Some(tag) = opts.take_str("tag")? {
        distro.tag = tag;
    }
    if let Some(pkgs) = opts.take_str("pkgs")? {
        distro = distro.with_packages(&pkgs);
    }
    if let Some(upgrade) = opts.take_bool("upgrade")? {
        distro.upgrade = upgrade;
    }
    if let Some(extras) = opts.take_str("extras")? {
        distro.steps = Step::parse_list(&extras)?;
    }
    opts.finish()?;

    let sandbox = env.sandbox(image_path)?;
    DistroBuild::new(pm, distro, sandbox).run()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::sandbox::testing::FakeTool;
    use std::path::Path;

    /// Synthetic 64-bit x86 host using `fake` as the build tool.
    pub(crate) fn env_for(fake: &FakeTool, proc_root: &Path, is_root: bool) -> BuildEnv {
        let host = HostInfo {
            is_root,
            proc_root: proc_root.to_path_buf(),
            pointer_width: 64,
            machine: "x86_64".to_string(),
        };
        let zone = fake.dir.path().join("zone");
        std::fs::write(&zone, "TZif").unwrap();
        let config = Config {
            localtime: zone,
            proc_root: proc_root.to_path_buf(),
            ..Config::default()
        };
        BuildEnv::new(host, config).with_tool(fake.tool())
    }
}
