//! os-release identification for a filesystem tree.
//!
//! See `os-release(5)`: `etc/os-release` takes precedence over
//! `usr/lib/os-release` and only one of them is ever read.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Candidate files, in priority order, relative to the tree root.
pub const CANDIDATES: &[&str] = &["etc/os-release", "usr/lib/os-release"];

/// Values used when neither candidate file exists.
const DEFAULTS: &[(&str, &str)] = &[("NAME", "Linux"), ("ID", "linux"), ("PRETTY_NAME", "Linux")];

/// Key lookup behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupMode {
    /// Match keys exactly instead of upper-casing them first.
    pub case_sensitive: bool,
    /// Fail on absent keys instead of returning an empty value.
    pub exact: bool,
}

/// Parsed os-release record.
#[derive(Debug, Clone)]
pub struct OsRelease {
    file: Option<PathBuf>,
    data: BTreeMap<String, String>,
    mode: LookupMode,
}

impl OsRelease {
    /// Read the record for the tree at `root` with default lookup behavior.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with(root, LookupMode::default())
    }

    /// Read the record for the tree at `root`.
    ///
    /// A malformed first candidate is an error; the second candidate is
    /// not consulted in that case.
    pub fn load_with(root: &Path, mode: LookupMode) -> Result<Self> {
        for candidate in CANDIDATES {
            let path = root.join(candidate);
            if !path.exists() {
                continue;
            }
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading '{}'", path.display()))?;
            let data = parse(&text).with_context(|| format!("parsing '{}'", path.display()))?;
            return Ok(Self {
                file: Some(path),
                data,
                mode,
            });
        }

        let data = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok(Self {
            file: None,
            data,
            mode,
        })
    }

    /// The file that was parsed, `None` when defaults apply.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Known keys, sorted.
    pub fn parms(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Raw lookup for any key, honoring the case mode.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(&self.normalize(key)).map(String::as_str)
    }

    /// Lookup returning an empty string for absent keys, or an error in
    /// exact mode.
    pub fn value(&self, key: &str) -> Result<&str> {
        let key = self.normalize(key);
        match self.data.get(&key) {
            Some(v) => Ok(v.as_str()),
            None if self.mode.exact => bail!("os-release has no key '{}'", key),
            None => Ok(""),
        }
    }

    // Typed accessors follow the lookup mode like `value()`.

    pub fn name(&self) -> Result<&str> {
        self.value("NAME")
    }

    pub fn id(&self) -> Result<&str> {
        self.value("ID")
    }

    pub fn pretty_name(&self) -> Result<&str> {
        self.value("PRETTY_NAME")
    }

    pub fn version_id(&self) -> Result<&str> {
        self.value("VERSION_ID")
    }

    fn normalize(&self, key: &str) -> String {
        if self.mode.case_sensitive {
            key.to_string()
        } else {
            key.to_ascii_uppercase()
        }
    }
}

/// Parse `KEY=VALUE` lines. Values split on the first `=` only and lose
/// one level of surrounding quotes.
fn parse(text: &str) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected KEY=VALUE, got '{}'", lineno + 1, line);
        };
        if key.is_empty() {
            bail!("line {}: empty key", lineno + 1);
        }
        data.insert(key.to_string(), unquote(value).to_string());
    }
    Ok(data)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_usr_lib_fallback() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "usr/lib/os-release", "ID=alpine\nVERSION_ID=3.19.1\n");

        let rel = OsRelease::load(temp.path()).unwrap();

        assert_eq!(rel.file(), Some(temp.path().join("usr/lib/os-release").as_path()));
        assert_eq!(rel.id().unwrap(), "alpine");
        assert_eq!(rel.version_id().unwrap(), "3.19.1");
    }

    #[test]
    fn test_etc_wins_over_usr_lib() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "etc/os-release", "ID=ubuntu\n");
        write(temp.path(), "usr/lib/os-release", "ID=alpine\nVERSION_ID=3.19\n");

        let rel = OsRelease::load(temp.path()).unwrap();

        assert_eq!(rel.id().unwrap(), "ubuntu");
        assert_eq!(rel.version_id().unwrap(), "");
        assert_eq!(rel.parms(), vec!["ID"]);
    }

    #[test]
    fn test_defaults_without_files() {
        let temp = TempDir::new().unwrap();

        let rel = OsRelease::load(temp.path()).unwrap();

        assert!(rel.file().is_none());
        assert_eq!(rel.name().unwrap(), "Linux");
        assert_eq!(rel.id().unwrap(), "linux");
        assert_eq!(rel.pretty_name().unwrap(), "Linux");
        assert_eq!(rel.value("VERSION_ID").unwrap(), "");
        assert_eq!(rel.parms(), vec!["ID", "NAME", "PRETTY_NAME"]);
    }

    #[test]
    fn test_exact_mode_rejects_missing_key() {
        let temp = TempDir::new().unwrap();
        let mode = LookupMode {
            case_sensitive: false,
            exact: true,
        };

        let rel = OsRelease::load_with(temp.path(), mode).unwrap();

        assert_eq!(rel.value("id").unwrap(), "linux");
        assert!(rel.value("version_id").is_err());
        assert_eq!(rel.id().unwrap(), "linux");
        let err = rel.version_id().unwrap_err();
        assert_eq!(err.to_string(), "os-release has no key 'VERSION_ID'");
    }

    #[test]
    fn test_case_modes() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "etc/os-release", "ID=fedora\n");

        let folded = OsRelease::load(temp.path()).unwrap();
        assert_eq!(folded.get("id"), Some("fedora"));

        let strict = OsRelease::load_with(
            temp.path(),
            LookupMode {
                case_sensitive: true,
                exact: false,
            },
        )
        .unwrap();
        assert_eq!(strict.get("id"), None);
        assert_eq!(strict.get("ID"), Some("fedora"));
    }

    #[test]
    fn test_quotes_and_embedded_equals() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "etc/os-release",
            "# comment\nNAME=\"Ubuntu\"\nVERSION=\"20.04.6 LTS (Focal Fossa)\"\n\nEXTRA=a=b\n",
        );

        let rel = OsRelease::load(temp.path()).unwrap();

        assert_eq!(rel.name().unwrap(), "Ubuntu");
        assert_eq!(rel.get("VERSION"), Some("20.04.6 LTS (Focal Fossa)"));
        assert_eq!(rel.get("EXTRA"), Some("a=b"));
    }

    #[test]
    fn test_malformed_first_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "etc/os-release", "ID=ubuntu\ngarbage line\n");
        write(temp.path(), "usr/lib/os-release", "ID=alpine\n");

        let err = OsRelease::load(temp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("expected KEY=VALUE"));
    }
}
