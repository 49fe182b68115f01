// src/errors.rs

//! Crate-wide error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced synchronously from `ProcessController::start`.
///
/// None of these leave a process running.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("invalid process spec: {0}")]
    Construction(String),

    #[error("could not create results file: {source}")]
    ResultChannel {
        #[source]
        source: io::Error,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// A temporary results file that could not be deleted in time.
///
/// Reported through logging only; by the time cleanup runs the process has
/// already completed from the caller's point of view.
#[derive(Error, Debug)]
#[error("failed to delete results file {} after {attempts} attempt(s): {last_error}", path.display())]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub attempts: u32,
    pub last_error: io::Error,
}

#[derive(Error, Debug)]
pub enum TailexecError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TailexecError>;
