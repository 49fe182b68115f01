// src/exec/invoker.rs

//! Platform-specific process launch.

use std::process::Stdio;
use std::time::Instant;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use super::LaunchError;
use super::env::ResolvedEnvironment;
use super::spec::{CommandLine, ProcessSpec};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How a shell command string is handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInvocation {
    pub program: &'static str,
    pub args: Vec<String>,
    /// Pass the command through verbatim instead of quoting it as an
    /// argument. Only meaningful for `cmd.exe`.
    pub raw: bool,
}

/// Pick the shell for the current OS.
///
/// - Windows: `cmd /C`, with the command passed through unescaped.
/// - macOS: `/bin/bash -l -c`, a login shell so the user's profile sets up
///   `PATH` the way a terminal would.
/// - Linux: `/bin/bash -c`, no login shell.
/// - Other Unix: `/bin/sh -c`.
pub fn shell_invocation(command: &str) -> ShellInvocation {
    if cfg!(windows) {
        ShellInvocation {
            program: "cmd",
            args: vec!["/C".to_string(), command.to_string()],
            raw: true,
        }
    } else if cfg!(target_os = "macos") {
        ShellInvocation {
            program: "/bin/bash",
            args: vec!["-l".to_string(), "-c".to_string(), command.to_string()],
            raw: false,
        }
    } else if cfg!(target_os = "linux") {
        ShellInvocation {
            program: "/bin/bash",
            args: vec!["-c".to_string(), command.to_string()],
            raw: false,
        }
    } else {
        ShellInvocation {
            program: "/bin/sh",
            args: vec!["-c".to_string(), command.to_string()],
            raw: false,
        }
    }
}

/// A live child process and its captured pipes.
#[derive(Debug)]
pub struct ProcessHandle {
    pub child: Child,
    pub pid: Option<u32>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    pub started_at: Instant,
}

/// Launch `command` with the settings in `spec` and the given environment.
///
/// `command` is passed separately from `spec` because it is the version with
/// the results-file placeholder already substituted.
pub fn spawn(
    command: &CommandLine,
    spec: &ProcessSpec,
    env: &ResolvedEnvironment,
) -> Result<ProcessHandle, LaunchError> {
    let mut cmd = build_command(command, spec.use_shell_wrapping);

    cmd.env_clear()
        .envs(env.opaque())
        .envs(env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(windows)]
    if spec.hide_console_window {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    if spec.hide_console_window {
        debug!("hide_console_window has no effect on this platform");
    }

    let started_at = Instant::now();
    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        command: command.to_string(),
        source,
    })?;

    let pid = child.id();
    info!(pid, command = %command, "process started");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    Ok(ProcessHandle {
        child,
        pid,
        stdout,
        stderr,
        started_at,
    })
}

fn build_command(command: &CommandLine, use_shell_wrapping: bool) -> Command {
    match command {
        CommandLine::Shell(line) => shell_command(line),
        CommandLine::Argv(argv) if use_shell_wrapping => shell_command(&argv.join(" ")),
        CommandLine::Argv(argv) => {
            let mut cmd = Command::new(&argv[0]);
            cmd.args(&argv[1..]);
            cmd
        }
    }
}

fn shell_command(line: &str) -> Command {
    let invocation = shell_invocation(line);
    let mut cmd = Command::new(invocation.program);

    #[cfg(windows)]
    if invocation.raw {
        for arg in &invocation.args {
            cmd.raw_arg(arg);
        }
        return cmd;
    }

    cmd.args(&invocation.args);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::env::{compose, process_environment};

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_uses_plain_bash() {
        let inv = shell_invocation("echo hi");
        assert_eq!(inv.program, "/bin/bash");
        assert_eq!(inv.args, vec!["-c", "echo hi"]);
        assert!(!inv.raw);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_uses_login_shell() {
        let inv = shell_invocation("echo hi");
        assert_eq!(inv.program, "/bin/bash");
        assert_eq!(inv.args, vec!["-l", "-c", "echo hi"]);
    }

    #[cfg(windows)]
    #[test]
    fn windows_passes_command_raw_to_cmd() {
        let inv = shell_invocation("echo \"hi\"");
        assert_eq!(inv.program, "cmd");
        assert_eq!(inv.args, vec!["/C", "echo \"hi\""]);
        assert!(inv.raw);
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let spec = ProcessSpec::argv(["definitely-not-a-real-program-4821"]).unwrap();
        let env = compose(&process_environment(), &Default::default(), None);
        let err = spawn(&spec.command, &spec, &env).unwrap_err();
        match err {
            LaunchError::Spawn { command, .. } => {
                assert!(command.contains("definitely-not-a-real-program-4821"));
            }
            other => panic!("expected Spawn error, got {other:?}"),
        }
    }
}
