//! File writes into a sandbox tree.
//!
//! Unlike a staging tree, a sandbox is never overwritten: every new file
//! must not exist yet, so applying a recipe twice fails instead of
//! silently clobbering earlier output.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

/// File body, either verbatim text or lines joined with a trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent(String);

impl FileContent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&[&str]> for FileContent {
    fn from(lines: &[&str]) -> Self {
        Self(lines.join("\n") + "\n")
    }
}

impl<const N: usize> From<[&str; N]> for FileContent {
    fn from(lines: [&str; N]) -> Self {
        Self::from(&lines[..])
    }
}

impl From<Vec<String>> for FileContent {
    fn from(lines: Vec<String>) -> Self {
        Self(lines.join("\n") + "\n")
    }
}

/// Resolve `rel` under `root`.
///
/// A leading `/` is taken as the sandbox root, not the host root.
/// Parent traversal is rejected.
pub fn sandbox_path(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel = Path::new(rel.trim_start_matches('/'));
    for component in rel.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            bail!("path escapes the sandbox: '{}'", rel.display());
        }
    }
    if rel.as_os_str().is_empty() {
        bail!("empty sandbox path");
    }
    Ok(root.join(rel))
}

/// Write a new file with `mode`, refusing to replace anything.
pub fn write_new_file(root: &Path, rel: &str, content: &FileContent, mode: u32) -> Result<PathBuf> {
    let path = sandbox_path(root, rel)?;
    if path.symlink_metadata().is_ok() {
        bail!("refusing to overwrite '{}'", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    file.write_all(content.as_str().as_bytes())
        .with_context(|| format!("writing '{}'", path.display()))?;
    drop(file);

    fs::set_permissions(&path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on '{}'", mode, path.display()))?;
    Ok(path)
}

/// Replace `rel` inside `root` with a copy of host file `src`.
///
/// Contents and mode bits are copied. A missing destination is fine.
pub fn replace_with_host_file(root: &Path, rel: &str, src: &Path) -> Result<PathBuf> {
    let dst = sandbox_path(root, rel)?;
    // symlink_metadata so a dangling zoneinfo link is removed too
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(&dst).with_context(|| format!("removing '{}'", dst.display()))?;
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }

    fs::copy(src, &dst)
        .with_context(|| format!("copying '{}' to '{}'", src.display(), dst.display()))?;
    let mode = fs::metadata(src)
        .with_context(|| format!("reading mode of '{}'", src.display()))?
        .permissions()
        .mode();
    fs::set_permissions(&dst, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode on '{}'", dst.display()))?;
    Ok(dst)
}
