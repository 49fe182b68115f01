// src/exec/controller.rs

//! The process controller: one launched process and its workers.
//!
//! Per process there are up to four background tasks:
//! - an exit supervisor that owns the `Child`, reaps it, and kills it on
//!   request,
//! - a stdout and a stderr reader,
//! - a results-file tailer when the command used the placeholder.
//!
//! A finisher task joins all of them and then delivers
//! `Listener::on_finished` exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::env::{compose, non_unicode_environment, process_environment};
use super::invoker::{ProcessHandle, spawn};
use super::listener::{Completion, Listener, OutputChannel};
use super::reader::forward_stream;
use super::results::{ResultsChannel, resolve};
use super::spec::ProcessSpec;
use super::tailer::{Tailer, delete_with_retry};
use crate::errors::LaunchError;
use crate::fs::{FileSystem, RealFileSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exited {
    pub code: Option<i32>,
}

/// State touched from the caller and from every worker task.
#[derive(Debug)]
pub(crate) struct Shared {
    killed: AtomicBool,
    kill_tx: watch::Sender<bool>,
    exit_tx: watch::Sender<Option<Exited>>,
    results: Mutex<Option<ResultsChannel>>,
}

impl Shared {
    fn new(results: Option<ResultsChannel>) -> Self {
        Self {
            killed: AtomicBool::new(false),
            kill_tx: watch::Sender::new(false),
            exit_tx: watch::Sender::new(None),
            results: Mutex::new(results),
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Set the kill flag and wake everyone waiting on it. Returns `true` for
    /// the first request only.
    pub fn request_kill(&self) -> bool {
        let first = !self.killed.swap(true, Ordering::SeqCst);
        if first {
            self.kill_tx.send_replace(true);
        }
        first
    }

    /// Resolves once a kill has been requested.
    pub async fn killed(&self) {
        let mut rx = self.kill_tx.subscribe();
        let _ = rx.wait_for(|killed| *killed).await;
    }

    /// Resolves once the process has been reaped.
    pub async fn exited(&self) {
        let mut rx = self.exit_tx.subscribe();
        let _ = rx.wait_for(Option::is_some).await;
    }

    pub fn is_alive(&self) -> bool {
        self.exit_tx.borrow().is_none()
    }

    fn exit_state(&self) -> Option<Exited> {
        *self.exit_tx.borrow()
    }

    fn results(&self) -> MutexGuard<'_, Option<ResultsChannel>> {
        // A poisoned lock only means a listener panicked mid-callback; the
        // channel reference itself is still consistent.
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn results_channel(&self) -> Option<ResultsChannel> {
        self.results().clone()
    }

    pub fn take_results_channel(&self) -> Option<ResultsChannel> {
        self.results().take()
    }
}

/// Handle to a launched process.
///
/// Cheap to clone; every clone controls the same process, so `kill` may be
/// called from any task.
#[derive(Debug, Clone)]
pub struct ProcessController {
    shared: Arc<Shared>,
    pid: Option<u32>,
    started_at: Instant,
    finished: watch::Receiver<Option<Completion>>,
}

impl ProcessController {
    /// Launch `spec`, streaming output to `listener`.
    ///
    /// Returns as soon as the process is running, unless `spec.wait_timeout`
    /// is set, in which case it first waits for the process to exit or the
    /// timeout to elapse. Must be called from within a Tokio runtime.
    pub async fn start(spec: ProcessSpec, listener: Arc<dyn Listener>) -> Result<Self, LaunchError> {
        Self::start_with_fs(spec, listener, Arc::new(RealFileSystem)).await
    }

    pub async fn start_with_fs(
        spec: ProcessSpec,
        listener: Arc<dyn Listener>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, LaunchError> {
        let env = compose(
            &process_environment(),
            &spec.environment_overlay,
            spec.path_override.as_deref(),
        )
        .with_opaque(non_unicode_environment());
        let (command, channel) = resolve(&spec.command, spec.results_file_path.as_deref(), fs.as_ref())?;

        let handle = match spawn(&command, &spec, &env) {
            Ok(handle) => handle,
            Err(err) => {
                if let Some(channel) = channel.filter(ResultsChannel::owned_by_process) {
                    if let Err(warning) = delete_with_retry(fs.as_ref(), channel.path(), &spec.cleanup).await {
                        warn!("{warning}");
                    }
                }
                return Err(err);
            }
        };
        drop(env);

        let ProcessHandle {
            child,
            pid,
            stdout,
            stderr,
            started_at,
        } = handle;

        let shared = Arc::new(Shared::new(channel.clone()));
        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(3);

        if let Some(stdout) = stdout {
            workers.push(tokio::spawn(forward_stream(
                stdout,
                OutputChannel::Stdout,
                Arc::clone(&listener),
                Arc::clone(&shared),
            )));
        }
        if let Some(stderr) = stderr {
            workers.push(tokio::spawn(forward_stream(
                stderr,
                OutputChannel::Stderr,
                Arc::clone(&listener),
                Arc::clone(&shared),
            )));
        }
        if let Some(channel) = channel {
            let tailer = Tailer {
                channel,
                listener: Arc::clone(&listener),
                shared: Arc::clone(&shared),
                fs,
                poll_interval: spec.poll_interval,
                results_timeout: spec.results_timeout,
                cleanup: spec.cleanup,
            };
            workers.push(tokio::spawn(tailer.run()));
        }

        let supervisor = tokio::spawn(supervise(child, pid, Arc::clone(&shared)));

        let (finished_tx, finished) = watch::channel(None);
        tokio::spawn(finish(
            supervisor,
            workers,
            listener,
            Arc::clone(&shared),
            started_at,
            finished_tx,
        ));

        let controller = Self {
            shared,
            pid,
            started_at,
            finished,
        };

        if let Some(timeout) = spec.wait_timeout {
            if tokio::time::timeout(timeout, controller.shared.exited())
                .await
                .is_err()
            {
                warn!(pid, ?timeout, "process still running after wait timeout");
            }
        }

        Ok(controller)
    }

    /// Request termination. Idempotent; returns once the process has been
    /// reaped. No further `on_data` is delivered after this returns.
    pub async fn kill(&self) {
        if self.shared.request_kill() {
            info!(pid = self.pid, "kill requested");
        } else {
            debug!(pid = self.pid, "kill already requested");
        }
        self.shared.exited().await;
    }

    /// Non-blocking liveness check.
    pub fn poll(&self) -> bool {
        self.shared.is_alive()
    }

    /// Wait until every worker is done and return the completion summary.
    pub async fn wait(&self) -> Completion {
        let mut finished = self.finished.clone();
        let completion = finished.wait_for(Option::is_some).await.ok().and_then(|c| *c);
        completion.unwrap_or_else(|| Completion {
            exit_code: self.shared.exit_state().and_then(|e| e.code),
            killed: self.shared.is_killed(),
            elapsed: self.elapsed(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_killed(&self) -> bool {
        self.shared.is_killed()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The results channel, until the tailer has cleaned it up.
    pub fn results_channel(&self) -> Option<ResultsChannel> {
        self.shared.results_channel()
    }
}

/// Own the child until it exits, killing it if asked to.
async fn supervise(mut child: Child, pid: Option<u32>, shared: Arc<Shared>) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = shared.killed() => {
            if let Err(e) = child.kill().await {
                warn!(pid, error = %e, "failed to kill child process");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => {
            info!(pid, exit_code = status.code(), success = status.success(), "process exited");
            status.code()
        }
        Err(e) => {
            warn!(pid, error = %e, "waiting for process failed");
            None
        }
    };
    shared.exit_tx.send_replace(Some(Exited { code }));
}

async fn finish(
    supervisor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    listener: Arc<dyn Listener>,
    shared: Arc<Shared>,
    started_at: Instant,
    finished_tx: watch::Sender<Option<Completion>>,
) {
    if let Err(e) = supervisor.await {
        warn!(error = %e, "exit supervisor task failed");
    }
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "output worker task failed");
        }
    }

    let completion = Completion {
        exit_code: shared.exit_state().and_then(|e| e.code),
        killed: shared.is_killed(),
        elapsed: started_at.elapsed(),
    };
    debug!(?completion, "all workers finished");

    listener.on_finished(&completion);
    finished_tx.send_replace(Some(completion));
}
