// src/exec/listener.rs

//! The outbound contract between a running process and whatever consumes
//! its output.

use std::fmt;
use std::time::Duration;

/// Which independent channel a chunk of output arrived on.
///
/// Chunks within one channel arrive in the order produced; there is no
/// ordering between channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    Stdout,
    Stderr,
    ResultsFile,
}

impl OutputChannel {
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::ResultsFile => "results-file",
        }
    }
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Summary handed to [`Listener::on_finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub killed: bool,
    pub elapsed: Duration,
}

impl Completion {
    pub fn success(&self) -> bool {
        !self.killed && self.exit_code == Some(0)
    }
}

/// Receives raw output chunks and a single completion notification.
///
/// Called from background tasks, so implementations must be thread-safe and
/// should not block for long.
pub trait Listener: Send + Sync + 'static {
    fn on_data(&self, channel: OutputChannel, chunk: &[u8]);

    /// Delivered exactly once, after every reader and the tailer are done.
    fn on_finished(&self, completion: &Completion);
}
