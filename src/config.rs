//! User configuration (`$XDG_CONFIG_HOME/ssbh/config.toml`).
//!
//! Every key is optional:
//!
//! ```toml
//! tool = "/usr/local/bin/apptainer"
//! localtime = "/etc/localtime"
//! proc_root = "/proc"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::host::proc::PROC_ROOT;

/// Host timezone file copied into sandboxes.
pub const LOCALTIME: &str = "/etc/localtime";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    tool: Option<String>,
    localtime: Option<PathBuf>,
    proc_root: Option<PathBuf>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Build tool override (path or name looked up in PATH).
    pub tool: Option<String>,
    pub localtime: PathBuf,
    pub proc_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: None,
            localtime: PathBuf::from(LOCALTIME),
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }
}

impl Config {
    /// Default config file location, if a config dir is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ssbh").join("config.toml"))
    }

    /// Load `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(text)?;
        let defaults = Self::default();
        Ok(Self {
            tool: parsed.tool.filter(|t| !t.trim().is_empty()),
            localtime: parsed.localtime.unwrap_or(defaults.localtime),
            proc_root: parsed.proc_root.unwrap_or(defaults.proc_root),
        })
    }
}
