//! Build helper for pre-configured Singularity/Apptainer sandboxes.
//!
//! Pulls a base distribution image into a writable directory sandbox, runs
//! a fixed recipe of package installs inside it, and writes a few
//! configuration files and scripts into the tree.
//!
//! # Architecture
//!
//! ```text
//! profile (targets: alpine, fedora, ubuntu, unc, hb)
//!     │
//!     ├── unifi / homebridge ── preflight, host process + identity checks
//!     │
//!     └── distro::DistroBuild<P: PackageManager>
//!             │   Alpine | Fedora | Ubuntu package verbs
//!             │
//!             └── sandbox::Sandbox ── external build tool (build / exec)
//!                     └── direct file writes (never overwriting)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ssbh::profile::{self, BuildEnv, BuildOptions, Target};
//! use ssbh::{Config, HostInfo};
//!
//! let config = Config::load(None)?;
//! let env = BuildEnv::new(HostInfo::detect(config.proc_root.clone()), config);
//! profile::build(Target::Ubuntu, None, BuildOptions::parse(&["tag=jammy"]), &env)?;
//! ```

pub mod config;
pub mod distro;
pub mod host;
pub mod preflight;
pub mod profile;
pub mod sandbox;

pub use config::Config;
pub use distro::{DistroBuild, DistroOptions, PackageManager, Step};
pub use host::{HostInfo, OsRelease};
pub use profile::{BuildEnv, BuildOptions, Target};
pub use sandbox::{BuildTool, Sandbox};
