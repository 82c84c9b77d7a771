//! Writable directory sandboxes driven through the external build tool.
//!
//! A [`Sandbox`] owns one target directory. It is built once from an image
//! spec, then mutated with in-sandbox commands and direct file writes. It is
//! never removed; the directory is the build artifact.
//!
//! # Example
//!
//! ```rust,ignore
//! use ssbh::sandbox::{BuildTool, Sandbox};
//!
//! let sb = Sandbox::with_tool("alpine", BuildTool::locate(None)?)?;
//! sb.build("docker://alpine:latest")?;
//! sb.exec("apk update")?;
//! sb.write_file("etc/motd", "hello\n", 0o644)?;
//! ```

pub mod files;
pub mod tool;

use anyhow::{bail, Context, Result};
use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub use files::FileContent;
pub use tool::BuildTool;

use crate::config::Config;

/// Login environment file. Sorts last in `.singularity.d/env` so distro
/// profile scripts cannot override it.
pub const ENV_FILE: &str = ".singularity.d/env/99-zzzzzzzz-final-env.sh";

/// Directory for the convenience scripts.
pub const HELPERS_DIR: &str = "usr/local/bin";

/// Argument vector for a command run inside the sandbox.
///
/// Built from a whitespace-separated string or from ready-made tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn args(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        Self(line.split_whitespace().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(args: &[&str]) -> Self {
        Self(args.iter().map(|a| a.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(args: [&str; N]) -> Self {
        Self::from(&args[..])
    }
}

/// Handle to a sandbox directory.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    tool: BuildTool,
    localtime: PathBuf,
}

impl Sandbox {
    /// Validate the target path and locate the build tool from `config`.
    pub fn create(image_path: &str, config: &Config) -> Result<Self> {
        let path = resolve_target(image_path)?;
        let tool = BuildTool::locate(config.tool.as_deref())?;
        Ok(Self {
            path,
            tool,
            localtime: config.localtime.clone(),
        })
    }

    /// Validate the target path and use an already resolved tool.
    pub fn with_tool(image_path: &str, tool: BuildTool) -> Result<Self> {
        Ok(Self {
            path: resolve_target(image_path)?,
            tool,
            localtime: PathBuf::from(crate::config::LOCALTIME),
        })
    }

    /// Host timezone file used by [`Sandbox::localtime`].
    pub fn set_localtime_source(&mut self, path: PathBuf) {
        self.localtime = path;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tool(&self) -> &BuildTool {
        &self.tool
    }

    /// Materialize the sandbox from an image spec such as
    /// `docker://ubuntu:focal`.
    pub fn build(&self, spec: &str) -> Result<()> {
        let cwd = self.path.parent().unwrap_or(Path::new("/"));
        let mut args = vec![
            "build".to_string(),
            "--sandbox".to_string(),
            "--fix-perms".to_string(),
        ];
        args.push(self.path.display().to_string());
        args.push(spec.to_string());
        self.run(&args, cwd)
            .with_context(|| format!("building sandbox from '{}'", spec))
    }

    /// Run a command inside the sandbox with fakeroot and writable mode.
    pub fn exec(&self, cmd: impl Into<CommandLine>) -> Result<()> {
        self.exec_as(cmd, true)
    }

    /// Run a command inside the sandbox; `admin` requests fakeroot and
    /// writable mode.
    pub fn exec_as(&self, cmd: impl Into<CommandLine>, admin: bool) -> Result<()> {
        let cmd = cmd.into();
        if cmd.args().is_empty() {
            bail!("empty command");
        }
        let mut args = vec!["exec".to_string()];
        if admin {
            args.push("--fakeroot".to_string());
            args.push("--writable".to_string());
        }
        args.push(self.path.display().to_string());
        args.extend(cmd.args().iter().cloned());
        self.run(&args, Path::new("/"))
    }

    /// Write a new file at a sandbox-relative path.
    pub fn write_file(&self, rel: &str, content: impl Into<FileContent>, mode: u32) -> Result<()> {
        files::write_new_file(&self.path, rel, &content.into(), mode)?;
        Ok(())
    }

    /// Replace `etc/localtime` with the host's timezone file.
    pub fn localtime(&self) -> Result<()> {
        files::replace_with_host_file(&self.path, "etc/localtime", &self.localtime)?;
        Ok(())
    }

    /// Generate the login environment: editor variables and a prompt
    /// showing `name[:tag]`, `#` when writable and `$` under an overlay.
    pub fn mkenv(&self, name: &str, tag: &str, editor: &str, editor_args: &str) -> Result<()> {
        self.write_file(ENV_FILE, env_script(name, tag, editor, editor_args), 0o755)
    }

    /// Install the `ll`, `la` and `e` helper scripts.
    pub fn helpers(&self) -> Result<()> {
        self.write_file(
            &format!("{}/ll", HELPERS_DIR),
            ["#!/bin/sh", "/bin/ls --color=auto -lFh \"$@\""],
            0o755,
        )?;
        self.write_file(
            &format!("{}/la", HELPERS_DIR),
            ["#!/bin/sh", "/bin/ls --color=auto -lFha \"$@\""],
            0o755,
        )?;
        self.write_file(
            &format!("{}/e", HELPERS_DIR),
            [
                "#!/bin/sh",
                "test -z \"$EDITOR\" && EDITOR=\"vi\"",
                "$EDITOR $EDITOR_ARGUMENTS \"$@\"",
            ],
            0o755,
        )
    }

    /// Print the command for the transcript, then run it to completion.
    fn run(&self, args: &[String], cwd: &Path) -> Result<()> {
        let line = std::iter::once(self.tool.path().display().to_string())
            .chain(args.iter().cloned())
            .map(|a| quote(&a).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        println!("# cmd: {}", line);
        println!("# cwd: {}", quote(&cwd.display().to_string()));

        let status = Command::new(self.tool.path())
            .args(args)
            .current_dir(cwd)
            .status()
            .with_context(|| format!("Failed to execute {}", self.tool.path().display()))?;

        if !status.success() {
            bail!(
                "{} {} failed with exit code: {}",
                self.tool.name(),
                args.first().map(String::as_str).unwrap_or_default(),
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}

/// Absolute target path; refuses anything that already exists.
///
/// A bare name is taken relative to the current directory.
fn resolve_target(image_path: &str) -> Result<PathBuf> {
    if image_path.is_empty() {
        bail!("empty image path");
    }
    let raw = Path::new(image_path);
    let abs = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        env::current_dir()
            .context("resolving current directory")?
            .join(raw)
    };

    let (Some(parent), Some(name)) = (abs.parent(), abs.file_name()) else {
        bail!("invalid image path '{}'", image_path);
    };
    if !parent.is_dir() {
        bail!("parent directory '{}' does not exist", parent.display());
    }
    let path = fs::canonicalize(parent)
        .with_context(|| format!("resolving '{}'", parent.display()))?
        .join(name);

    if path.symlink_metadata().is_ok() {
        bail!("refusing to overwrite '{}'", path.display());
    }
    Ok(path)
}

fn env_script(name: &str, tag: &str, editor: &str, editor_args: &str) -> Vec<String> {
    let mut ps1 = format!("export PS1=\"({}", name);
    if !tag.is_empty() {
        ps1.push(':');
        ps1.push_str(tag);
    }
    ps1.push_str(") $USER@$SINGULARITY_NAME \\w $prompt \"");

    vec![
        "#!/bin/sh".to_string(),
        format!("export EDITOR='{}'", editor),
        format!("export EDITOR_ARGUMENTS='{}'", editor_args),
        "prompt='#'".to_string(),
        "grep -q '^overlay /' /proc/mounts && prompt='$'".to_string(),
        ps1,
    ]
}

/// POSIX shell quoting for transcript lines.
fn quote(arg: &str) -> Cow<'_, str> {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', "'\"'\"'")))
    }
}
