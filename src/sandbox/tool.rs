//! Sandbox build tool resolution.
//!
//! Resolution order:
//! 1. `SSBH_TOOL` env var (path to binary)
//! 2. `tool` from the config file (path, or name looked up in PATH)
//! 3. `singularity` in PATH
//! 4. `apptainer` in PATH

use anyhow::{bail, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var overriding the build tool.
pub const TOOL_ENV: &str = "SSBH_TOOL";

/// Tool names searched in PATH, in order.
pub const TOOL_NAMES: &[&str] = &["singularity", "apptainer"];

/// Resolved build tool executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTool {
    path: PathBuf,
}

impl BuildTool {
    /// Use `path` as the build tool without any lookup.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Find the build tool using the resolution order.
    pub fn locate(configured: Option<&str>) -> Result<Self> {
        locate_from(env::var(TOOL_ENV).ok(), configured)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executable name, for operator instructions.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("singularity")
    }
}

fn locate_from(env_tool: Option<String>, configured: Option<&str>) -> Result<BuildTool> {
    // 1. Env override
    if let Some(raw) = env_tool {
        let path = PathBuf::from(&raw);
        if !path.exists() {
            bail!("{} points to non-existent path: {}", TOOL_ENV, raw);
        }
        if !is_executable(&path) {
            bail!(
                "{} points to invalid binary: {}\n\
                 File exists but is not executable.",
                TOOL_ENV,
                raw
            );
        }
        tracing::debug!(tool = %path.display(), "build tool from {}", TOOL_ENV);
        return Ok(BuildTool { path });
    }

    // 2. Config file
    if let Some(tool) = configured {
        let path = if tool.contains('/') {
            PathBuf::from(tool)
        } else {
            match which::which(tool) {
                Ok(path) => path,
                Err(_) => bail!("configured tool '{}' not in PATH", tool),
            }
        };
        if !is_executable(&path) {
            bail!("configured tool is not an executable file: {}", path.display());
        }
        tracing::debug!(tool = %path.display(), "build tool from config");
        return Ok(BuildTool { path });
    }

    // 3./4. PATH lookup
    for name in TOOL_NAMES {
        if let Ok(path) = which::which(name) {
            tracing::debug!(tool = %path.display(), "build tool from PATH");
            return Ok(BuildTool { path });
        }
    }

    bail!(
        "'singularity' binary not in PATH\n\n\
         Resolution order tried:\n\
         1. {} env var - not set\n\
         2. config file 'tool' - not set\n\
         3. {} in PATH - not found",
        TOOL_ENV,
        TOOL_NAMES.join(", ")
    )
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_env_override_wins() {
        let temp = TempDir::new().unwrap();
        let tool = script(temp.path(), "singularity", 0o755);

        let found = locate_from(Some(tool.display().to_string()), Some("ls")).unwrap();

        assert_eq!(found.path(), tool.as_path());
        assert_eq!(found.name(), "singularity");
    }

    #[test]
    fn test_env_override_not_executable() {
        let temp = TempDir::new().unwrap();
        let tool = script(temp.path(), "singularity", 0o644);

        let err = locate_from(Some(tool.display().to_string()), None).unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }

    #[test]
    fn test_env_override_missing() {
        let err = locate_from(Some("/definitely/not/here".into()), None).unwrap_err();
        assert!(err.to_string().contains("non-existent"));
    }

    #[test]
    fn test_configured_path() {
        let temp = TempDir::new().unwrap();
        let tool = script(temp.path(), "apptainer", 0o755);

        let found = locate_from(None, Some(&tool.display().to_string())).unwrap();
        assert_eq!(found.name(), "apptainer");
    }

    #[test]
    fn test_configured_name_in_path() {
        // 'sh' exists on any Unix system
        let found = locate_from(None, Some("sh")).unwrap();
        assert_eq!(found.name(), "sh");
    }

    #[test]
    fn test_configured_name_missing() {
        assert!(locate_from(None, Some("definitely_not_a_real_command_12345")).is_err());
    }
}
