// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `tailexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tailexec",
    version,
    about = "Run a build command and stream its output, including results written to a file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build file (TOML).
    ///
    /// Default: `Build.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Shell command to run instead of the build file's command.
    #[arg(long, value_name = "CMD", conflicts_with = "argv")]
    pub shell_cmd: Option<String>,

    /// Write results to this file instead of a temporary one.
    #[arg(long, value_name = "PATH")]
    pub results_file: Option<PathBuf>,

    /// Wait at start until the process exits or this elapses (e.g. `30s`).
    #[arg(long, value_name = "DURATION")]
    pub wait: Option<String>,

    /// Kill the process if the results file is still being tailed after
    /// this long (e.g. `60s`).
    #[arg(long, value_name = "DURATION")]
    pub results_timeout: Option<String>,

    /// Suppress `Running ...` and `[Finished ...]` lines.
    #[arg(long)]
    pub quiet: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TAILEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the launch, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command to execute directly, given after `--`.
    #[arg(last = true, value_name = "ARGV")]
    pub argv: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_after_double_dash() {
        let args = CliArgs::try_parse_from(["tailexec", "--quiet", "--", "make", "-j4"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.argv, vec!["make", "-j4"]);
        assert!(args.shell_cmd.is_none());
    }

    #[test]
    fn shell_cmd_conflicts_with_argv() {
        let res = CliArgs::try_parse_from(["tailexec", "--shell-cmd", "make", "--", "make"]);
        assert!(res.is_err());
    }
}
