// src/exec/tailer.rs

//! Results-file tailer.
//!
//! The launched process appends to the results file while we poll it for new
//! bytes. Nothing locks the file; we only ever read and re-poll. Once the
//! process is gone (or killed) the tailer deletes the file if this launch
//! created it.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::controller::Shared;
use super::listener::{Listener, OutputChannel};
use super::reader::READ_CHUNK_SIZE;
use super::results::ResultsChannel;
use super::spec::CleanupPolicy;
use crate::errors::CleanupWarning;
use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailerState {
    Polling,
    Draining,
    Cleanup,
    Closed,
}

pub(crate) struct Tailer {
    pub channel: ResultsChannel,
    pub listener: Arc<dyn Listener>,
    pub shared: Arc<Shared>,
    pub fs: Arc<dyn FileSystem>,
    pub poll_interval: Duration,
    pub results_timeout: Option<Duration>,
    pub cleanup: CleanupPolicy,
}

impl Tailer {
    pub async fn run(self) {
        let path = self.channel.path().to_path_buf();
        let deadline = self.results_timeout.map(|cap| Instant::now() + cap);
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        let mut file = self.open(&path, deadline).await;
        let mut state = if file.is_some() {
            TailerState::Polling
        } else {
            TailerState::Cleanup
        };

        while state != TailerState::Closed {
            state = match state {
                TailerState::Polling => match file.as_mut() {
                    Some(f) => self.poll(f, &mut buf, deadline).await,
                    None => TailerState::Cleanup,
                },
                TailerState::Draining => {
                    if let Some(f) = file.as_mut() {
                        self.drain(f, &mut buf).await;
                    }
                    TailerState::Cleanup
                }
                TailerState::Cleanup => {
                    // Close our handle before deleting; Windows refuses
                    // otherwise.
                    drop(file.take());
                    self.cleanup().await;
                    TailerState::Closed
                }
                TailerState::Closed => TailerState::Closed,
            };
        }

        debug!(path = %path.display(), "results tailer closed");
    }

    /// Open the results file, waiting for it to appear while the process
    /// is still running.
    async fn open(&self, path: &Path, deadline: Option<Instant>) -> Option<File> {
        loop {
            match File::open(path).await {
                Ok(f) => return Some(f),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if self.shared.is_killed() {
                        return None;
                    }
                    if !self.shared.is_alive() {
                        // The process may have created the file between our
                        // open and its exit; one more look before giving up.
                        return match File::open(path).await {
                            Ok(f) => Some(f),
                            Err(e) => {
                                debug!(path = %path.display(), error = %e, "results file never appeared");
                                None
                            }
                        };
                    }
                    if self.deadline_passed(deadline) {
                        return None;
                    }
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {}
                        () = self.shared.killed() => {}
                        () = self.shared.exited() => {}
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "could not open results file");
                    return None;
                }
            }
        }
    }

    async fn poll(&self, file: &mut File, buf: &mut [u8], deadline: Option<Instant>) -> TailerState {
        loop {
            match file.read(buf).await {
                Ok(0) => {}
                Ok(n) => {
                    if self.shared.is_killed() {
                        return TailerState::Cleanup;
                    }
                    self.listener.on_data(OutputChannel::ResultsFile, &buf[..n]);
                    continue;
                }
                Err(e) => {
                    debug!(error = %e, "results file read failed; treating as closed");
                    return TailerState::Cleanup;
                }
            }

            if self.shared.is_killed() {
                return TailerState::Cleanup;
            }
            if !self.shared.is_alive() {
                return TailerState::Draining;
            }
            if self.deadline_passed(deadline) {
                return TailerState::Cleanup;
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                () = self.shared.killed() => {}
                () = self.shared.exited() => {}
            }
        }
    }

    /// Kill the process once the results timeout has elapsed.
    fn deadline_passed(&self, deadline: Option<Instant>) -> bool {
        if !deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        warn!(
            path = %self.channel.path().display(),
            "results timeout elapsed; killing process"
        );
        self.shared.request_kill();
        true
    }

    /// Read whatever the process wrote between our last poll and its exit.
    async fn drain(&self, file: &mut File, buf: &mut [u8]) {
        loop {
            match file.read(buf).await {
                Ok(0) => return,
                Ok(n) => {
                    if self.shared.is_killed() {
                        return;
                    }
                    self.listener.on_data(OutputChannel::ResultsFile, &buf[..n]);
                }
                Err(e) => {
                    debug!(error = %e, "results file read failed while draining");
                    return;
                }
            }
        }
    }

    async fn cleanup(&self) {
        // The shared reference is cleared whatever happens to the file.
        let Some(channel) = self.shared.take_results_channel() else {
            return;
        };
        if !channel.owned_by_process() {
            return;
        }
        match delete_with_retry(self.fs.as_ref(), channel.path(), &self.cleanup).await {
            Ok(attempts) => {
                debug!(path = %channel.path().display(), attempts, "deleted results file");
            }
            Err(warning) => warn!("{warning}"),
        }
    }
}

/// Delete `path`, retrying transient lock errors with exponential backoff
/// until `policy.deadline` has passed.
///
/// A file that is already gone counts as deleted. Returns the number of
/// attempts made.
pub async fn delete_with_retry(
    fs: &dyn FileSystem,
    path: &Path,
    policy: &CleanupPolicy,
) -> Result<u32, CleanupWarning> {
    let started = Instant::now();
    let mut backoff = policy.initial_backoff;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let err = match fs.remove_file(path) {
            Ok(()) => return Ok(attempts),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(attempts),
            Err(e) => e,
        };

        if !is_transient(&err) || started.elapsed() + backoff > policy.deadline {
            return Err(CleanupWarning {
                path: path.to_path_buf(),
                attempts,
                last_error: err,
            });
        }

        debug!(path = %path.display(), attempts, error = %err, "results file still locked; retrying");
        sleep(backoff).await;
        backoff = (backoff * 2).min(policy.max_backoff);
    }
}

fn is_transient(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}
