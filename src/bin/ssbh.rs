//! `ssbh` - Singularity sandbox build helper.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use ssbh::profile::{self, BuildEnv, BuildOptions, Target};
use ssbh::{Config, HostInfo};

/// Singularity sandbox build helper.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List all supported containers + options
    #[arg(short, long)]
    list: bool,

    /// Path and name of the sandbox; defaults to the image name in the
    /// current directory
    #[arg(short, long, default_value = "")]
    image_path: String,

    /// Image name to create
    #[arg(short, long, default_value = "alpine")]
    name: String,

    /// key=value options depending on the image (repeatable)
    #[arg(short, long = "option", value_name = "KEY=VALUE")]
    option: Vec<String>,

    /// Config file (default: $XDG_CONFIG_HOME/ssbh/config.toml)
    #[arg(short, long, env = "SSBH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    restore_sigpipe();
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.list {
        for line in profile::list() {
            println!("{}", line);
        }
        return;
    }

    if let Err(e) = run(&args) {
        Args::command()
            .error(ErrorKind::InvalidValue, failure_line(&args.name, &e))
            .exit();
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let target: Target = args.name.parse()?;
    let config = Config::load(args.config.as_deref())?;
    let host = HostInfo::detect(config.proc_root.clone());
    let env = BuildEnv::new(host, config);
    let opts = BuildOptions::parse(args.option.as_slice());
    profile::build(target, Some(args.image_path.as_str()), opts, &env)
}

/// `<target>, <message>` with the full context chain.
fn failure_line(name: &str, err: &anyhow::Error) -> String {
    format!("{}, {:#}", name, err)
}

/// Die quietly on a closed stdout (e.g. `ssbh --list | head -1`).
fn restore_sigpipe() {
    // SAFETY: called once at startup before any other thread exists.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
