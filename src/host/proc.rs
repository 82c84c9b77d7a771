//! Live process inspection through a procfs-style tree.
//!
//! Only the executable field (argv[0]) of each `<pid>/cmdline` record is
//! kept. Processes that exit while the scan is running are skipped.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default process-information root.
pub const PROC_ROOT: &str = "/proc";

/// Collect argv[0] of every process under `root`.
///
/// Entries whose name is not purely numeric are ignored, as are empty
/// command lines (kernel threads). The result is recomputed on every call.
pub fn snapshot(root: &Path) -> Result<HashSet<String>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("reading process root '{}'", root.display()))?;

    let mut bins = HashSet::new();
    for entry in entries {
        // Raced with a process exit.
        let Ok(entry) = entry else {
            continue;
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        if let Some(bin) = executable(&raw) {
            bins.insert(bin);
        }
    }

    Ok(bins)
}

/// First null-separated field of a cmdline record, if non-empty.
fn executable(raw: &[u8]) -> Option<String> {
    let first = raw.split(|b| *b == 0).next()?;
    // Some processes rewrite their title without NULs; stop at a newline
    // the way a line-based read would.
    let first = first.split(|b| *b == b'\n').next()?;
    if first.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(first).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("1")).unwrap();
        fs::write(root.join("1/cmdline"), b"unifi\0").unwrap();
        fs::create_dir_all(root.join("2")).unwrap();
        fs::write(root.join("2/cmdline"), b"").unwrap();
        fs::create_dir_all(root.join("foo")).unwrap();
        fs::write(root.join("foo/cmdline"), b"bogus\0").unwrap();
        temp
    }

    #[test]
    fn test_snapshot_numeric_entries_only() {
        let temp = fake_proc();

        let bins = snapshot(temp.path()).unwrap();

        assert_eq!(bins, HashSet::from(["unifi".to_string()]));
    }

    #[test]
    fn test_snapshot_keeps_only_argv0() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("42")).unwrap();
        fs::write(
            temp.path().join("42/cmdline"),
            b"/usr/sbin/haveged\0--Foreground\0-w\01024\0",
        )
        .unwrap();

        let bins = snapshot(temp.path()).unwrap();

        assert!(bins.contains("/usr/sbin/haveged"));
        assert_eq!(bins.len(), 1);
    }

    #[test]
    fn test_snapshot_skips_vanished_process() {
        let temp = TempDir::new().unwrap();
        // PID directory without a cmdline record, as after a process exit.
        fs::create_dir_all(temp.path().join("77")).unwrap();

        let bins = snapshot(temp.path()).unwrap();
        assert!(bins.is_empty());
    }

    #[test]
    fn test_snapshot_title_rewrite() {
        assert_eq!(
            executable(b"avahi-daemon: running [host.local]"),
            Some("avahi-daemon: running [host.local]".to_string())
        );
        assert_eq!(executable(b"\0\0"), None);
    }

    #[test]
    fn test_snapshot_missing_root() {
        let temp = TempDir::new().unwrap();
        assert!(snapshot(&temp.path().join("nope")).is_err());
    }
}
