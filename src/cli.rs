use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the initrd described by the given build file
    Build(BuildArgs),

    /// Validate the given YAML build file
    Validate(ValidateArgs),

    /// Print the kernel and initrd file names of the boot root tree
    BootNames(BootNamesArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the YAML file describing the build
    #[arg(short, long, default_value = "build.yaml")]
    pub file: Utf8PathBuf,

    /// Base name of the initrd file (defaults to the configured base name)
    #[arg(long)]
    pub basename: Option<String>,

    /// Build the install-media variant of the initrd
    #[arg(long)]
    pub install_initrd: bool,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the YAML file to validate
    #[arg(short, long, default_value = "build.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct BootNamesArgs {
    /// Path to the YAML file describing the build
    #[arg(short, long, default_value = "build.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}
