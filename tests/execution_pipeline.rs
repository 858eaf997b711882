//! End-to-end execution pipeline tests against an in-memory runtime.

mod common;

use common::{FakeRuntime, Script, Stage, executor, leftover_workspaces};
use sandpit::container::ContainerRuntime;
use sandpit::executor::ExecutionError;
use sandpit::stream::{self, StreamType};
use std::time::Duration;

#[tokio::test]
async fn test_stdout_only_program() {
    let runtime = FakeRuntime::new(Script::stdout("hi\n"));
    let (executor, root) = executor(runtime.clone(), 10);

    let result = executor.execute("print('hi')").await.unwrap();

    assert_eq!(result.message(), "hi\n");
    assert_eq!(result.stdout, "hi\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert_eq!(runtime.sources(), vec!["print('hi')".to_string()]);
    assert_eq!(runtime.live_count(), 0);
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_stderr_takes_precedence() {
    let runtime = FakeRuntime::new(Script::output(
        "before\n",
        "Traceback (most recent call last):\nZeroDivisionError: division by zero\n",
        1,
    ));
    let (executor, _root) = executor(runtime.clone(), 10);

    let result = executor.execute("print('before'); 1/0").await.unwrap();

    assert!(result.message().starts_with("Traceback"));
    assert_eq!(result.stdout, "before\n");
    assert_eq!(result.exit_code, 1);
    assert!(!result.success());
}

#[tokio::test]
async fn test_empty_program_output() {
    let runtime = FakeRuntime::new(Script::default());
    let (executor, _root) = executor(runtime, 10);

    let result = executor.execute("").await.unwrap();
    assert_eq!(result.message(), "");
}

#[tokio::test]
async fn test_timeout_kills_and_removes_container() {
    let runtime = FakeRuntime::new(Script::hanging());
    let (executor, root) = executor(runtime.clone(), 10);

    let err = executor
        .execute_with_timeout("while True: pass", Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::TimedOut(_)), "got {:?}", err);
    assert_eq!(runtime.kill_count(), 1);
    assert!(runtime.list_managed().await.unwrap().is_empty());
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_failures_leave_nothing_behind() {
    for stage in [Stage::Create, Stage::Start, Stage::Wait, Stage::Logs] {
        let runtime = FakeRuntime::new(Script::failing_at(stage));
        let (executor, root) = executor(runtime.clone(), 10);

        let err = executor.execute("print('x')").await.unwrap_err();
        match stage {
            Stage::Create => assert!(matches!(err, ExecutionError::CreateFailed(_))),
            Stage::Start => assert!(matches!(err, ExecutionError::StartFailed(_))),
            Stage::Wait | Stage::Logs => assert!(matches!(err, ExecutionError::Runtime(_))),
        }

        assert_eq!(runtime.live_count(), 0, "container leaked after {:?}", stage);
        assert_eq!(leftover_workspaces(&root), 0, "workspace leaked after {:?}", stage);
    }
}

#[tokio::test]
async fn test_malformed_stream_is_reported_after_cleanup() {
    let mut raw = Vec::new();
    stream::encode_frame(StreamType::Stdout, b"partial", &mut raw);
    raw.extend_from_slice(&[3, 0, 0, 0, 0, 0, 0, 1, b'?']);

    let runtime = FakeRuntime::new(Script {
        raw_logs: Some(raw),
        ..Default::default()
    });
    let (executor, root) = executor(runtime.clone(), 10);

    let err = executor.execute("print('x')").await.unwrap_err();

    assert!(matches!(err, ExecutionError::MalformedStream(_)));
    assert_eq!(err.code(), "MALFORMED_STREAM");
    assert_eq!(runtime.live_count(), 0);
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_concurrent_executions_are_isolated() {
    let runtime = FakeRuntime::gated(Script::echo(), 2);
    let (executor, root) = executor(runtime.clone(), 10);

    // Neither container exits until both are running
    let (first, second) = tokio::join!(
        executor.execute("print('first')"),
        executor.execute("print('second')"),
    );

    assert_eq!(first.unwrap().stdout, "print('first')");
    assert_eq!(second.unwrap().stdout, "print('second')");
    assert_eq!(runtime.peak_live(), 2);

    let mounts = runtime.mount_sources();
    assert_eq!(mounts.len(), 2);
    assert_ne!(mounts[0], mounts[1]);

    let mut sources = runtime.sources();
    sources.sort();
    assert_eq!(sources, vec!["print('first')", "print('second')"]);
    assert_eq!(runtime.live_count(), 0);
    assert_eq!(leftover_workspaces(&root), 0);
}

#[tokio::test]
async fn test_source_is_staged_verbatim() {
    let source = "# -*- coding: utf-8 -*-\nprint(\"héllo\\n\")\n\n";
    let runtime = FakeRuntime::new(Script::echo());
    let (executor, _root) = executor(runtime.clone(), 10);

    let result = executor.execute(source).await.unwrap();

    assert_eq!(runtime.sources(), vec![source.to_string()]);
    assert_eq!(result.stdout, source);
}
