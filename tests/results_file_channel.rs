#![cfg(unix)]

mod common;
use crate::common::{finish, init_tracing, quick_cleanup, with_timeout};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tailexec::exec::{LaunchError, OutputChannel, ProcessController, ProcessSpec};
use tailexec::fs::FileSystem;
use tailexec::fs::mock::MockFileSystem;
use tailexec_test_utils::RecordingListener;

type TestResult = Result<(), Box<dyn Error>>;

fn spec_for(cmd: &str) -> Result<ProcessSpec, LaunchError> {
    ProcessSpec::builder()
        .shell_command(cmd)
        .cleanup_policy(quick_cleanup())
        .build()
}

#[tokio::test]
async fn temp_results_file_is_streamed_then_deleted() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = spec_for("printf 42 > <result_file>; echo <result_file>")?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    let completion = finish(&controller).await;

    assert!(completion.success());
    assert_eq!(listener.bytes(OutputChannel::ResultsFile), b"42");

    let path = PathBuf::from(listener.text(OutputChannel::Stdout).trim_end());
    assert!(path.is_absolute());
    assert!(!path.exists(), "temp results file should be deleted");
    assert!(controller.results_channel().is_none());
    Ok(())
}

#[tokio::test]
async fn supplied_results_file_is_kept() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let report = dir.path().join("report.txt");
    std::fs::write(&report, b"")?;

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("printf 'warning: x' >> <result_file>")
        .results_file_path(Some(report.clone()))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    assert_eq!(listener.text(OutputChannel::ResultsFile), "warning: x");
    assert!(report.exists(), "caller-supplied results file must not be deleted");
    assert_eq!(std::fs::read_to_string(&report)?, "warning: x");
    Ok(())
}

#[tokio::test]
async fn supplied_results_file_may_appear_later() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let report = dir.path().join("late.txt");

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("sleep 0.1; printf late > <result_file>")
        .results_file_path(Some(report.clone()))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    assert_eq!(listener.text(OutputChannel::ResultsFile), "late");
    assert!(report.exists());
    Ok(())
}

#[tokio::test]
async fn every_placeholder_gets_the_same_path() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = spec_for("echo <result_file> <result_file> <result_file>")?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    let out = listener.text(OutputChannel::Stdout);
    let paths: Vec<&str> = out.split_whitespace().collect();
    assert_eq!(paths.len(), 3);
    assert!(paths.iter().all(|p| *p == paths[0]));
    assert!(!paths[0].contains("<result_file>"));
    Ok(())
}

#[tokio::test]
async fn tailer_closes_when_nothing_is_ever_written() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = spec_for("true <result_file>; echo <result_file>")?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    let completion = finish(&controller).await;

    assert!(completion.success());
    assert!(listener.bytes(OutputChannel::ResultsFile).is_empty());
    let path = PathBuf::from(listener.text(OutputChannel::Stdout).trim_end());
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn growing_results_file_is_tailed_in_order() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = spec_for(
        "for i in 1 2 3 4 5; do echo \"line $i\" >> <result_file>; sleep 0.03; done",
    )?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    assert_eq!(
        listener.text(OutputChannel::ResultsFile),
        "line 1\nline 2\nline 3\nline 4\nline 5\n"
    );
    Ok(())
}

#[tokio::test]
async fn results_timeout_kills_the_process() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("printf partial > <result_file>; sleep 10")
        .results_timeout(Some(Duration::from_millis(200)))
        .cleanup_policy(quick_cleanup())
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    let completion = finish(&controller).await;

    assert!(completion.killed);
    assert!(completion.elapsed < Duration::from_secs(5));
    assert!(!controller.poll());
    assert!(controller.results_channel().is_none());
    Ok(())
}

#[tokio::test]
async fn failed_spawn_removes_the_temp_file() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .argv(["tailexec-no-such-binary-55120", "--out", "<result_file>"])
        .cleanup_policy(quick_cleanup())
        .build()?;

    let res = ProcessController::start_with_fs(spec, listener.clone(), Arc::new(fs.clone())).await;

    assert!(matches!(res, Err(LaunchError::Spawn { .. })));
    assert_eq!(fs.remove_attempts(), 1);
    assert!(!fs.exists(std::path::Path::new("/mock/tmp/tailexec-1.txt")));
    Ok(())
}

#[tokio::test]
async fn temp_file_creation_failure_is_reported() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.fail_create(std::io::ErrorKind::StorageFull);
    let listener = RecordingListener::new();

    let res = ProcessController::start_with_fs(
        spec_for("echo <result_file>")?,
        listener.clone(),
        Arc::new(fs),
    )
    .await;

    assert!(matches!(res, Err(LaunchError::ResultChannel { .. })));
    assert_eq!(listener.chunk_count(), 0);
    Ok(())
}

#[tokio::test]
async fn supplied_file_created_right_before_exit_is_read() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let mut lost = 0;
    for run in 0..100 {
        let report = dir.path().join(format!("exit-{run}.txt"));
        let listener = RecordingListener::new();
        let spec = ProcessSpec::builder()
            .shell_command("sleep 0.0$((RANDOM % 3)); printf X > <result_file>")
            .results_file_path(Some(report))
            .poll_interval(Duration::from_millis(1))
            .build()?;
        let controller = ProcessController::start(spec, listener.clone()).await?;
        finish(&controller).await;

        if listener.bytes(OutputChannel::ResultsFile) != b"X" {
            lost += 1;
        }
    }

    assert_eq!(lost, 0, "results written just before exit were dropped");
    Ok(())
}

#[tokio::test]
async fn tailer_cleans_up_promptly_after_exit() -> TestResult {
    init_tracing();

    let poll_interval = Duration::from_millis(20);
    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("printf done > <result_file>; sleep 0.2")
        .poll_interval(poll_interval)
        .cleanup_policy(quick_cleanup())
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    assert!(controller.results_channel().is_some());

    with_timeout(async {
        while controller.poll() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    let exited_at = std::time::Instant::now();

    with_timeout(async {
        while controller.results_channel().is_some() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;

    assert!(
        exited_at.elapsed() < poll_interval * 10,
        "tailer took {:?} to clean up",
        exited_at.elapsed()
    );
    finish(&controller).await;
    assert_eq!(listener.text(OutputChannel::ResultsFile), "done");
    Ok(())
}

#[tokio::test]
async fn locked_temp_file_is_retried_until_deleted() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.fail_removals(3, std::io::ErrorKind::PermissionDenied);
    let listener = RecordingListener::new();

    let controller = ProcessController::start_with_fs(
        spec_for("true <result_file>")?,
        listener.clone(),
        Arc::new(fs.clone()),
    )
    .await?;
    let completion = finish(&controller).await;

    assert!(completion.success());
    assert_eq!(fs.remove_attempts(), 4);
    assert!(!fs.exists(std::path::Path::new("/mock/tmp/tailexec-1.txt")));
    assert!(controller.results_channel().is_none());
    Ok(())
}
