// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::CommandLine;

/// A build file as read from TOML, before validation.
///
/// ```toml
/// shell_cmd = "cargo clippy --message-format=short 2> <result_file>"
/// working_dir = "."
/// path = "$HOME/.cargo/bin:$PATH"
/// results_timeout = "60s"
///
/// [env]
/// RUST_BACKTRACE = "1"
/// ```
///
/// Exactly one of `cmd` / `shell_cmd` must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuildConfig {
    /// Argv form: executed directly.
    #[serde(default)]
    pub cmd: Option<Vec<String>>,

    /// Shell form: always run through the platform shell.
    #[serde(default)]
    pub shell_cmd: Option<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Environment overlay for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Per-user overlay, merged on top of `env`.
    #[serde(default)]
    pub build_env: BTreeMap<String, String>,

    /// Replaces `PATH` for the child. Use `$PATH` to extend the inherited one.
    #[serde(default)]
    pub path: Option<String>,

    /// Run `cmd` through the platform shell.
    #[serde(default)]
    pub shell: bool,

    /// Hide the console window on Windows.
    #[serde(default = "default_startup_info")]
    pub startup_info: bool,

    #[serde(default)]
    pub results_file_path: Option<PathBuf>,

    /// Block at start until the process exits or this elapses (`"30s"`).
    #[serde(default)]
    pub wait: Option<String>,

    /// Cap on how long the results file is tailed before the process is
    /// killed (`"60s"`). Unset means no cap.
    #[serde(default)]
    pub results_timeout: Option<String>,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub initial_message: Option<String>,
}

fn default_startup_info() -> bool {
    true
}

impl Default for RawBuildConfig {
    fn default() -> Self {
        Self {
            cmd: None,
            shell_cmd: None,
            working_dir: None,
            env: BTreeMap::new(),
            build_env: BTreeMap::new(),
            path: None,
            shell: false,
            startup_info: default_startup_info(),
            results_file_path: None,
            wait: None,
            results_timeout: None,
            quiet: false,
            initial_message: None,
        }
    }
}

/// A validated build file.
///
/// Obtain one via `BuildConfig::try_from(raw)` (see `validate.rs`) or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub command: CommandLine,
    pub working_dir: Option<PathBuf>,
    /// `env` with `build_env` merged on top.
    pub env: BTreeMap<String, String>,
    pub path: Option<String>,
    pub shell: bool,
    pub startup_info: bool,
    pub results_file_path: Option<PathBuf>,
    pub wait: Option<Duration>,
    pub results_timeout: Option<Duration>,
    pub quiet: bool,
    pub initial_message: Option<String>,
}
