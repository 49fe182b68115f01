// src/exec/spec.rs

//! Immutable launch requests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::LaunchError;

/// What to run: an argv list or a shell command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Executed directly; `argv[0]` is looked up on the child's `PATH`.
    Argv(Vec<String>),
    /// Always run through the platform shell.
    Shell(String),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Argv(argv) => write!(f, "{}", argv.join(" ")),
            CommandLine::Shell(cmd) => write!(f, "{cmd}"),
        }
    }
}

/// Bounded retry for deleting a results file that may still be locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Total time after which deletion is abandoned with a warning.
    pub deadline: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            deadline: Duration::from_secs(5),
        }
    }
}

/// A validated launch request.
///
/// Build one with [`ProcessSpec::builder`]; the builder rejects requests
/// that set both or neither of argv and shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub command: CommandLine,
    pub environment_overlay: BTreeMap<String, String>,
    pub path_override: Option<String>,
    /// Run an argv command through the platform shell. Has no effect on
    /// [`CommandLine::Shell`], which is always shell-wrapped.
    pub use_shell_wrapping: bool,
    pub hide_console_window: bool,
    pub results_file_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    /// Block in `start` until the process exits or this elapses.
    pub wait_timeout: Option<Duration>,
    /// Wall-clock cap for tailing the results file. On expiry the process
    /// is killed. `None` tails until the process exits.
    pub results_timeout: Option<Duration>,
    /// How often the results tailer re-polls the file.
    pub poll_interval: Duration,
    pub cleanup: CleanupPolicy,
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl ProcessSpec {
    pub fn builder() -> ProcessSpecBuilder {
        ProcessSpecBuilder::default()
    }

    pub fn argv(argv: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, LaunchError> {
        Self::builder().argv(argv).build()
    }

    pub fn shell(cmd: impl Into<String>) -> Result<Self, LaunchError> {
        Self::builder().shell_command(cmd).build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessSpecBuilder {
    argv: Option<Vec<String>>,
    shell_command: Option<String>,
    environment_overlay: BTreeMap<String, String>,
    path_override: Option<String>,
    use_shell_wrapping: bool,
    hide_console_window: bool,
    results_file_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    wait_timeout: Option<Duration>,
    results_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    cleanup: Option<CleanupPolicy>,
}

impl ProcessSpecBuilder {
    pub fn argv(mut self, argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn shell_command(mut self, cmd: impl Into<String>) -> Self {
        self.shell_command = Some(cmd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_overlay.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.environment_overlay.extend(vars);
        self
    }

    pub fn path_override(mut self, path: Option<String>) -> Self {
        self.path_override = path;
        self
    }

    pub fn use_shell_wrapping(mut self, val: bool) -> Self {
        self.use_shell_wrapping = val;
        self
    }

    pub fn hide_console_window(mut self, val: bool) -> Self {
        self.hide_console_window = val;
        self
    }

    pub fn results_file_path(mut self, path: Option<PathBuf>) -> Self {
        self.results_file_path = path;
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn results_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.results_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = Some(policy);
        self
    }

    pub fn build(self) -> Result<ProcessSpec, LaunchError> {
        let command = match (self.argv, self.shell_command) {
            (Some(_), Some(_)) => {
                return Err(LaunchError::Construction(
                    "only one of argv or shell command may be set".to_string(),
                ));
            }
            (None, None) => {
                return Err(LaunchError::Construction(
                    "one of argv or shell command is required".to_string(),
                ));
            }
            (Some(argv), None) => {
                if argv.first().is_none_or(|program| program.is_empty()) {
                    return Err(LaunchError::Construction(
                        "argv must name a program".to_string(),
                    ));
                }
                CommandLine::Argv(argv)
            }
            (None, Some(cmd)) => {
                if cmd.trim().is_empty() {
                    return Err(LaunchError::Construction(
                        "shell command must not be empty".to_string(),
                    ));
                }
                CommandLine::Shell(cmd)
            }
        };

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(LaunchError::Construction(
                "poll interval must be non-zero".to_string(),
            ));
        }

        Ok(ProcessSpec {
            command,
            environment_overlay: self.environment_overlay,
            path_override: self.path_override,
            use_shell_wrapping: self.use_shell_wrapping,
            hide_console_window: self.hide_console_window,
            results_file_path: self.results_file_path,
            working_dir: self.working_dir,
            wait_timeout: self.wait_timeout,
            results_timeout: self.results_timeout,
            poll_interval,
            cleanup: self.cleanup.unwrap_or_default(),
        })
    }
}
