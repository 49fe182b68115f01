// src/exec/mod.rs

//! Process execution core.
//!
//! - [`spec`] describes a launch request (`ProcessSpec`).
//! - [`env`] composes the child environment without touching the
//!   process-wide one.
//! - [`results`] substitutes the `<result_file>` placeholder and creates the
//!   temporary results file when needed.
//! - [`invoker`] decides between direct exec and the platform shell and
//!   spawns the process with `tokio::process::Command`.
//! - [`reader`] streams stdout/stderr to the listener.
//! - [`tailer`] polls the results file and deletes it afterwards.
//! - [`controller`] ties it together behind `start` / `kill` / `poll` /
//!   `wait`.

pub mod controller;
pub mod env;
pub mod invoker;
pub mod listener;
pub mod reader;
pub mod results;
pub mod spec;
pub mod tailer;

pub use crate::errors::{CleanupWarning, LaunchError};
pub use controller::ProcessController;
pub use env::{ResolvedEnvironment, compose, non_unicode_environment, process_environment};
pub use listener::{Completion, Listener, OutputChannel};
pub use results::{RESULT_FILE_PLACEHOLDER, ResultsChannel};
pub use spec::{CleanupPolicy, CommandLine, ProcessSpec, ProcessSpecBuilder};
