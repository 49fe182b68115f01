// src/runner.rs

//! Drives one build from a `BuildConfig` and renders it on the console.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use crate::config::BuildConfig;
use crate::exec::{
    Completion, CommandLine, LaunchError, Listener, OutputChannel, ProcessController,
    ProcessSpec, ResolvedEnvironment, compose, process_environment,
};

/// Exit code reported when the build was cancelled with Ctrl-C.
const CANCELLED_EXIT_CODE: i32 = 130;

/// Turn a build file into a launch request.
pub fn build_spec(cfg: &BuildConfig) -> std::result::Result<ProcessSpec, LaunchError> {
    let builder = match &cfg.command {
        CommandLine::Argv(argv) => ProcessSpec::builder().argv(argv.iter().cloned()),
        CommandLine::Shell(line) => ProcessSpec::builder().shell_command(line.clone()),
    };

    builder
        .envs(cfg.env.clone())
        .path_override(cfg.path.clone())
        .use_shell_wrapping(cfg.shell)
        .hide_console_window(cfg.startup_info)
        .results_file_path(cfg.results_file_path.clone())
        .working_dir(cfg.working_dir.clone())
        .wait_timeout(cfg.wait)
        .results_timeout(cfg.results_timeout)
        .build()
}

/// The environment the build would run with.
pub fn resolved_environment(cfg: &BuildConfig) -> ResolvedEnvironment {
    compose(&process_environment(), &cfg.env, cfg.path.as_deref())
}

/// Diagnostic block printed when a launch fails.
pub fn debug_text(cfg: &BuildConfig) -> String {
    let command = match &cfg.command {
        CommandLine::Shell(line) => format!("[shell_cmd: {line}]"),
        CommandLine::Argv(argv) => format!("[cmd: {argv:?}]"),
    };
    let dir = match &cfg.working_dir {
        Some(dir) => dir.display().to_string(),
        None => std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|_| ".".to_string()),
    };
    let env = resolved_environment(cfg);
    let path = env.path().unwrap_or("");

    format!("{command}\n[dir: {dir}]\n[path: {path}]")
}

/// `[Finished ...]` / `[Cancelled]` line for a completed build.
pub fn finished_message(completion: &Completion) -> String {
    if completion.killed {
        return "[Cancelled]".to_string();
    }
    let secs = completion.elapsed.as_secs_f64();
    match completion.exit_code {
        Some(0) => format!("[Finished in {secs:.1}s]"),
        Some(code) => format!("[Finished in {secs:.1}s with exit code {code}]"),
        None => format!("[Finished in {secs:.1}s (terminated by signal)]"),
    }
}

/// Sink that writes build output straight to the terminal.
///
/// Results-file chunks go to stdout alongside the process's own stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// The closing line for `completion`, if this sink prints one. A
    /// cancellation is always reported, even for quiet builds.
    pub fn completion_line(&self, completion: &Completion) -> Option<String> {
        (!self.quiet || completion.killed).then(|| finished_message(completion))
    }
}

impl Listener for ConsoleSink {
    fn on_data(&self, channel: OutputChannel, chunk: &[u8]) {
        let res = match channel {
            OutputChannel::Stdout | OutputChannel::ResultsFile => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk).and_then(|()| out.flush())
            }
            OutputChannel::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(chunk).and_then(|()| err.flush())
            }
        };
        if let Err(e) = res {
            debug!(%channel, error = %e, "failed to write output chunk");
        }
    }

    fn on_finished(&self, completion: &Completion) {
        if let Some(line) = self.completion_line(completion) {
            println!("{line}");
        }
    }
}

/// Run one build to completion and return the exit code to report.
///
/// Ctrl-C kills the build. Launch failures are printed with the
/// diagnostic block and reported as exit code 1.
pub async fn run_build(cfg: BuildConfig) -> Result<i32> {
    let spec = build_spec(&cfg)?;

    if !cfg.quiet {
        println!("Running {}", cfg.command);
        if let Some(msg) = &cfg.initial_message {
            println!("{msg}");
        }
    }

    let sink = Arc::new(ConsoleSink::new(cfg.quiet));
    let controller = match ProcessController::start(spec, sink).await {
        Ok(controller) => controller,
        Err(err) => {
            error!(error = %err, "launch failed");
            eprintln!("{err}");
            eprintln!("{}", debug_text(&cfg));
            if !cfg.quiet {
                eprintln!("[Finished]");
            }
            return Ok(1);
        }
    };

    // Ctrl-C → kill.
    let ctrl_c = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            controller.kill().await;
        })
    };

    let completion = controller.wait().await;
    ctrl_c.abort();

    debug!(?completion, "build finished");
    Ok(exit_code(&completion))
}

fn exit_code(completion: &Completion) -> i32 {
    if completion.killed {
        CANCELLED_EXIT_CODE
    } else {
        completion.exit_code.unwrap_or(1)
    }
}
