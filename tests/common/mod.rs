#![allow(dead_code)]

use std::time::Duration;

use tailexec::exec::{CleanupPolicy, OutputChannel, ProcessController};
pub use tailexec_test_utils::{RecordingListener, init_tracing, with_timeout};

/// Cleanup policy that gives up quickly, so failures don't stall tests.
pub fn quick_cleanup() -> CleanupPolicy {
    CleanupPolicy {
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        deadline: Duration::from_millis(500),
    }
}

/// Poll until `channel` has received something containing `needle`.
pub async fn wait_for_output(listener: &RecordingListener, channel: OutputChannel, needle: &str) {
    with_timeout(async {
        while !listener.text(channel).contains(needle) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

pub async fn finish(controller: &ProcessController) -> tailexec::exec::Completion {
    with_timeout(controller.wait()).await
}
