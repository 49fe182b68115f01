#![cfg(unix)]

mod common;
use crate::common::{finish, init_tracing};

use std::error::Error;
use std::time::Duration;

use tailexec::exec::{LaunchError, OutputChannel, ProcessController, ProcessSpec};
use tailexec_test_utils::RecordingListener;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn echo_streams_stdout_then_completes() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::shell("echo hi")?;
    let controller = ProcessController::start(spec, listener.clone()).await?;

    let completion = finish(&controller).await;

    assert_eq!(listener.bytes(OutputChannel::Stdout), b"hi\n");
    assert!(listener.bytes(OutputChannel::Stderr).is_empty());
    assert!(listener.bytes(OutputChannel::ResultsFile).is_empty());
    assert_eq!(completion.exit_code, Some(0));
    assert!(completion.success());
    assert_eq!(listener.finished_count(), 1);
    assert!(!controller.poll());
    Ok(())
}

#[tokio::test]
async fn interleaved_streams_keep_per_stream_order() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::shell(
        "for i in $(seq 1 500); do echo \"out $i\"; echo \"err $i\" >&2; done",
    )?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    let expected_out: String = (1..=500).map(|i| format!("out {i}\n")).collect();
    let expected_err: String = (1..=500).map(|i| format!("err {i}\n")).collect();

    assert_eq!(listener.text(OutputChannel::Stdout), expected_out);
    assert_eq!(listener.text(OutputChannel::Stderr), expected_err);
    Ok(())
}

#[tokio::test]
async fn exit_code_is_reported() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let controller = ProcessController::start(ProcessSpec::shell("exit 3")?, listener.clone()).await?;

    let completion = finish(&controller).await;
    assert_eq!(completion.exit_code, Some(3));
    assert!(!completion.killed);
    assert!(!completion.success());
    Ok(())
}

#[tokio::test]
async fn argv_runs_without_a_shell() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::argv(["printf", "%s", "a $HOME b"])?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    // No shell, so `$HOME` is passed through untouched.
    assert_eq!(listener.text(OutputChannel::Stdout), "a $HOME b");
    Ok(())
}

#[tokio::test]
async fn argv_with_shell_wrapping_goes_through_the_shell() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .argv(["echo", "wrapped", "&&", "echo", "again"])
        .use_shell_wrapping(true)
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    assert_eq!(listener.text(OutputChannel::Stdout), "wrapped\nagain\n");
    Ok(())
}

#[tokio::test]
async fn environment_overlay_and_path_override_reach_the_child() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("printf '%s|%s' \"$COMBINED\" \"$PATH\"")
        .env("BASE_PART", "bar")
        .env("COMBINED", "${BASE_PART}-baz")
        .path_override(Some("/definitely/missing:$PATH".to_string()))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    let out = listener.text(OutputChannel::Stdout);
    let (combined, path) = out.split_once('|').ok_or("missing separator")?;
    assert_eq!(combined, "bar-baz");
    assert!(path.starts_with("/definitely/missing:"));
    assert!(!path.contains("$PATH"));
    Ok(())
}

#[tokio::test]
async fn working_dir_is_set_per_launch() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cwd_before = std::env::current_dir()?;

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("pwd -P")
        .working_dir(Some(dir.path().to_path_buf()))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;
    finish(&controller).await;

    let reported = listener.text(OutputChannel::Stdout);
    assert_eq!(reported.trim_end(), dir.path().canonicalize()?.to_string_lossy());
    assert_eq!(std::env::current_dir()?, cwd_before);
    Ok(())
}

#[tokio::test]
async fn missing_executable_fails_synchronously() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::argv(["tailexec-no-such-binary-91827"])?;

    match ProcessController::start(spec, listener.clone()).await {
        Err(LaunchError::Spawn { command, source }) => {
            assert!(command.contains("tailexec-no-such-binary-91827"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        Err(e) => panic!("expected Spawn error, got {e:?}"),
        Ok(_) => panic!("expected Spawn error, got a running process"),
    }
    assert_eq!(listener.finished_count(), 0);
    Ok(())
}

#[tokio::test]
async fn wait_timeout_blocks_until_exit() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("sleep 0.2; echo done")
        .wait_timeout(Some(Duration::from_secs(5)))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;

    assert!(!controller.poll());
    finish(&controller).await;
    assert_eq!(listener.text(OutputChannel::Stdout), "done\n");
    Ok(())
}

#[tokio::test]
async fn wait_timeout_expiry_leaves_process_running() -> TestResult {
    init_tracing();

    let listener = RecordingListener::new();
    let spec = ProcessSpec::builder()
        .shell_command("sleep 5")
        .wait_timeout(Some(Duration::from_millis(50)))
        .build()?;
    let controller = ProcessController::start(spec, listener.clone()).await?;

    assert!(controller.poll());
    controller.kill().await;
    assert!(!controller.poll());
    Ok(())
}
