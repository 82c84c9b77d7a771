//! Distribution sandboxes built from an official Docker image.
//!
//! Each distro supplies its package verbs through [`PackageManager`]; the
//! shared sequencing lives in [`DistroBuild`]:
//!
//! ```text
//! build docker://<image>:<tag>
//!   └── steps, in order (default: localtime helpers mkenv [install] [upgrade])
//!         update   - at most once per build
//!         upgrade  - update, then upgrade everything
//!         install  - update, then install the package list (if any)
//!         mkenv    - prompt from the sandbox's own os-release
//! ```

pub mod alpine;
pub mod fedora;
pub mod ubuntu;

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

pub use alpine::Alpine;
pub use fedora::Fedora;
pub use ubuntu::Ubuntu;

use crate::host::OsRelease;
use crate::sandbox::Sandbox;

/// Editor available in every base image; anything else gets installed.
pub const BASE_EDITOR: &str = "vi";

/// Editor configured for the distro sandboxes.
pub const DISTRO_EDITOR: &str = "nano";

/// Package-manager verbs for one distribution.
pub trait PackageManager {
    /// Docker Hub repository name.
    fn image(&self) -> &'static str;

    /// Refresh the package index.
    fn update(&self, sb: &Sandbox) -> Result<()>;

    /// Upgrade every installed package.
    fn upgrade(&self, sb: &Sandbox) -> Result<()>;

    /// Install `pkgs`.
    fn install(&self, sb: &Sandbox, pkgs: &[String]) -> Result<()>;
}

/// Named post-build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Localtime,
    Helpers,
    Mkenv,
    Update,
    Upgrade,
    Install,
}

impl Step {
    /// Steps run when none are configured.
    pub const DEFAULT: &'static [Step] = &[Step::Localtime, Step::Helpers, Step::Mkenv];

    const TABLE: &'static [(&'static str, Step)] = &[
        ("localtime", Step::Localtime),
        ("helpers", Step::Helpers),
        ("mkenv", Step::Mkenv),
        ("update", Step::Update),
        ("upgrade", Step::Upgrade),
        ("install", Step::Install),
    ];

    pub fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, step)| *step == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Parse a whitespace-separated step list.
    pub fn parse_list(list: &str) -> Result<Vec<Step>> {
        list.split_whitespace().map(str::parse).collect()
    }
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::TABLE.iter().find(|(name, _)| *name == s) {
            Some((_, step)) => Ok(*step),
            None => bail!(
                "unknown step '{}'; expected one of: {}",
                s,
                Self::TABLE
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-facing knobs of a distro build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroOptions {
    /// Image tag.
    pub tag: String,
    pub pkgs: Vec<String>,
    pub upgrade: bool,
    pub editor: String,
    pub editor_args: String,
    pub steps: Vec<Step>,
}

impl Default for DistroOptions {
    fn default() -> Self {
        Self {
            tag: "latest".to_string(),
            pkgs: Vec::new(),
            upgrade: false,
            editor: DISTRO_EDITOR.to_string(),
            editor_args: String::new(),
            steps: Step::DEFAULT.to_vec(),
        }
    }
}

impl DistroOptions {
    /// Options with a whitespace-separated package list.
    pub fn with_packages(mut self, pkgs: &str) -> Self {
        self.pkgs = pkgs.split_whitespace().map(str::to_string).collect();
        self
    }
}

/// One distro sandbox build in progress.
#[derive(Debug)]
pub struct DistroBuild<P> {
    pm: P,
    sandbox: Sandbox,
    tag: String,
    pkgs: Vec<String>,
    editor: String,
    editor_args: String,
    steps: Vec<Step>,
    updated: bool,
}

impl<P: PackageManager> DistroBuild<P> {
    /// Plan the build; nothing runs until [`DistroBuild::run`].
    ///
    /// A non-base editor joins the package list, `install` is added when
    /// there are packages and `upgrade` when requested.
    pub fn new(pm: P, opts: DistroOptions, sandbox: Sandbox) -> Self {
        let DistroOptions {
            tag,
            mut pkgs,
            upgrade,
            editor,
            editor_args,
            mut steps,
        } = opts;

        if editor != BASE_EDITOR {
            pkgs.push(editor.clone());
        }
        if !pkgs.is_empty() && !steps.contains(&Step::Install) {
            steps.push(Step::Install);
        }
        if upgrade {
            steps.push(Step::Upgrade);
        }

        Self {
            pm,
            sandbox,
            tag,
            pkgs,
            editor,
            editor_args,
            steps,
            updated: false,
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Planned steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Planned package list.
    pub fn packages(&self) -> &[String] {
        &self.pkgs
    }

    /// `docker://<image>:<tag>`
    pub fn image_spec(&self) -> String {
        format!("docker://{}:{}", self.pm.image(), self.tag)
    }

    /// Build the sandbox, then run every planned step.
    pub fn run(&mut self) -> Result<()> {
        self.sandbox.build(&self.image_spec())?;
        for step in self.steps.clone() {
            println!("# extra: {}()", step);
            self.run_step(step)?;
        }
        Ok(())
    }

    pub fn run_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Localtime => self.sandbox.localtime(),
            Step::Helpers => self.sandbox.helpers(),
            Step::Mkenv => self.mkenv(),
            Step::Update => self.update(),
            Step::Upgrade => self.upgrade(),
            Step::Install => self.install(),
        }
    }

    /// Refresh the package index unless this build already did.
    pub fn update(&mut self) -> Result<()> {
        if !self.updated {
            self.pm.update(&self.sandbox)?;
            self.updated = true;
        } else {
            tracing::debug!("package index already updated");
        }
        Ok(())
    }

    /// Refresh the package index even if already done, e.g. after adding
    /// a package source.
    pub fn refresh(&mut self) -> Result<()> {
        self.pm.update(&self.sandbox)?;
        self.updated = true;
        Ok(())
    }

    pub fn upgrade(&mut self) -> Result<()> {
        self.update()?;
        self.pm.upgrade(&self.sandbox)
    }

    /// Install the planned package list, if any.
    pub fn install(&mut self) -> Result<()> {
        if self.pkgs.is_empty() {
            return Ok(());
        }
        self.update()?;
        self.pm.install(&self.sandbox, &self.pkgs)
    }

    /// Install extra packages directly, outside the planned list.
    pub fn install_packages(&self, pkgs: &[&str]) -> Result<()> {
        let pkgs: Vec<String> = pkgs.iter().map(|p| p.to_string()).collect();
        self.pm.install(&self.sandbox, &pkgs)
    }

    /// Login environment labelled with what the image actually contains.
    pub fn mkenv(&self) -> Result<()> {
        let rel = OsRelease::load(self.sandbox.path())?;
        self.sandbox
            .mkenv(rel.id()?, rel.version_id()?, &self.editor, &self.editor_args)
    }
}
