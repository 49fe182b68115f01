// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod runner;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{BuildConfig, RawBuildConfig, default_config_path, load_resolved};
use crate::exec::CommandLine;

/// High-level entry point used by `main.rs`.
///
/// Returns the exit code the binary should report.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    runner::run_build(cfg).await
}

/// Combine the build file (if any) with command-line overrides.
///
/// An explicit `--config` must exist. The default `Build.toml` is optional
/// as long as the command line names a command.
pub fn resolve_config(args: &CliArgs) -> Result<BuildConfig> {
    let mut raw = match &args.config {
        Some(path) => load_resolved(path)
            .with_context(|| format!("loading build file {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                load_resolved(&path)
                    .with_context(|| format!("loading build file {}", path.display()))?
            } else {
                RawBuildConfig::default()
            }
        }
    };

    if let Some(line) = &args.shell_cmd {
        raw.shell_cmd = Some(line.clone());
        raw.cmd = None;
    } else if !args.argv.is_empty() {
        raw.cmd = Some(args.argv.clone());
        raw.shell_cmd = None;
    }
    if raw.cmd.is_none() && raw.shell_cmd.is_none() {
        bail!("nothing to run: give a command after `--`, use --shell-cmd, or provide a build file");
    }

    if let Some(path) = &args.results_file {
        raw.results_file_path = Some(path.clone());
    }
    if let Some(wait) = &args.wait {
        raw.wait = Some(wait.clone());
    }
    if let Some(cap) = &args.results_timeout {
        raw.results_timeout = Some(cap.clone());
    }
    raw.quiet |= args.quiet;

    Ok(BuildConfig::try_from(raw)?)
}

/// Print what would be launched without launching it.
fn print_dry_run(cfg: &BuildConfig) {
    println!("tailexec dry-run");
    match &cfg.command {
        CommandLine::Shell(line) => println!("  shell_cmd: {line}"),
        CommandLine::Argv(argv) => println!("  cmd: {argv:?}"),
    }
    if let Some(dir) = &cfg.working_dir {
        println!("  working_dir: {}", dir.display());
    }
    if let Some(path) = &cfg.results_file_path {
        println!("  results_file_path: {}", path.display());
    }
    if cfg.shell {
        println!("  shell: true");
    }
    if let Some(wait) = cfg.wait {
        println!("  wait: {wait:?}");
    }
    if let Some(cap) = cfg.results_timeout {
        println!("  results_timeout: {cap:?}");
    }
    if !cfg.env.is_empty() {
        println!("  env:");
        for (key, value) in &cfg.env {
            println!("    {key} = {value}");
        }
    }

    let env = runner::resolved_environment(cfg);
    println!("  PATH: {}", env.path().unwrap_or(""));

    debug!("dry-run complete (no execution)");
}
