//! JavaScript and TypeScript runs against a real Node.js

use std::time::Duration;
use studio_sandbox::{ControllerStatus, ExecutionRequest, LanguageId, OutputChannel, OutputMessage};
use studio_tests::common::{config_with_timeout, setup_test_logging, Harness};
use studio_tests::require_interpreter;

#[tokio::test]
async fn test_console_output_and_clean_exit() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"console.log("hi"); console.error("bye");"#,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert!(result.duration_ms < 30_000);
    let outputs = harness.sink.outputs();
    assert_eq!(outputs[0], OutputMessage::info("$ node main.js"));
    assert_eq!(outputs[1], OutputMessage::stdout("hi"));
    assert_eq!(outputs[2], OutputMessage::stderr("bye"));
}

#[tokio::test]
async fn test_thrown_error_is_reported_once() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(LanguageId::JavaScript, r#"throw new Error("boom");"#)
        .await;

    assert_eq!(result.exit_code, 1);
    assert_eq!(
        harness.sink.lines(OutputChannel::Stderr),
        vec!["Runtime Error: boom".to_string()]
    );
}

#[tokio::test]
async fn test_console_levels_and_formatting() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"
console.warn("careful");
console.info("note");
console.debug("trace");
console.log("sum", 1 + 2, { a: 1 }, [1, 2]);
"#,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(
        harness.sink.lines(OutputChannel::Stdout)[..4],
        [
            "WARNING: careful".to_string(),
            "INFO: note".to_string(),
            "trace".to_string(),
            "sum 3 { a: 1 } [ 1, 2 ]".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_program_cannot_see_host_process() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    harness
        .run(
            LanguageId::JavaScript,
            "console.log(typeof process, typeof require);",
        )
        .await;

    assert!(harness
        .sink
        .lines(OutputChannel::Stdout)
        .contains(&"undefined undefined".to_string()));
}

#[tokio::test]
async fn test_printed_frames_are_plain_text() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"console.log('{"type":"exit","code":7}'); throw new Error("still running");"#,
        )
        .await;

    assert_eq!(result.exit_code, 1);
    assert!(harness
        .sink
        .lines(OutputChannel::Stdout)
        .contains(&r#"{"type":"exit","code":7}"#.to_string()));
}

#[tokio::test]
async fn test_unhandled_rejection_surfaces_on_stderr() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"Promise.reject(new Error("later"));"#,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert!(harness
        .sink
        .lines(OutputChannel::Stderr)
        .contains(&"Uncaught (in promise): later".to_string()));
}

#[tokio::test]
async fn test_typescript_annotations_are_stripped() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::TypeScript,
            "function add(a: number, b: number): number { return a + b; }\nconsole.log(add(40, 2));",
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert!(harness
        .sink
        .lines(OutputChannel::Stdout)
        .contains(&"42".to_string()));
}

#[tokio::test]
async fn test_stop_kills_infinite_loop() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();
    let controller = harness.service.controller(LanguageId::JavaScript);

    harness
        .service
        .run(ExecutionRequest::new(LanguageId::JavaScript, "while (true) {}"));
    let mut status = controller.subscribe();
    status
        .wait_for(|s| matches!(s, ControllerStatus::Running(_)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.service.stop();
    harness.service.stop();

    let result = harness.wait(LanguageId::JavaScript).await;
    assert_eq!(result.exit_code, 130);
    assert_eq!(harness.sink.completions().len(), 1);
    assert!(harness
        .sink
        .lines(OutputChannel::Info)
        .contains(&"Execution stopped by user".to_string()));
}

#[tokio::test]
async fn test_timeout_kills_infinite_loop() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::with_config(&config_with_timeout(
        LanguageId::JavaScript,
        Duration::from_secs(1),
    ));

    let result = harness
        .run(LanguageId::JavaScript, "for (;;) {}")
        .await;

    assert_eq!(result.exit_code, 124);
    assert!(result.duration_ms >= 1_000);
    assert!(result.duration_ms < 10_000);
    assert!(harness
        .sink
        .lines(OutputChannel::Info)
        .contains(&"Execution timed out after 1s".to_string()));
}

#[tokio::test]
async fn test_rerun_supersedes_previous_session() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    harness.service.run(ExecutionRequest::new(
        LanguageId::JavaScript,
        "let i = 0; while (true) { if (i++ % 1e7 === 0) console.log('old'); }",
    ));
    let result = harness
        .run(LanguageId::JavaScript, "console.log('new');")
        .await;

    assert_eq!(result.exit_code, 0);
    let codes: Vec<i32> = harness
        .sink
        .completions()
        .iter()
        .map(|c| c.exit_code)
        .collect();
    assert_eq!(codes, vec![130, 0]);

    // Nothing from the first session after its completion
    tokio::time::sleep(Duration::from_millis(300)).await;
    let outputs = harness.sink.outputs();
    let second_banner = outputs
        .iter()
        .rposition(|m| *m == OutputMessage::info("$ node main.js"))
        .unwrap();
    assert!(outputs[second_banner..]
        .iter()
        .all(|m| m.text != "old"));
}

#[tokio::test]
async fn test_timers_run_before_completion() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"
setTimeout(() => console.log("later"), 10);
queueMicrotask(() => console.log("micro"));
console.log("now");
"#,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    let stdout = harness.sink.lines(OutputChannel::Stdout);
    assert_eq!(stdout[..3], ["now".to_string(), "micro".to_string(), "later".to_string()]);
    assert!(harness.sink.lines(OutputChannel::Stderr).is_empty());
}

#[tokio::test]
async fn test_error_in_timer_callback_is_reported() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::JavaScript,
            r#"setTimeout(() => { throw new Error("late"); }, 5);"#,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(
        harness.sink.lines(OutputChannel::Stderr),
        vec!["Error: late".to_string()]
    );
}

#[tokio::test]
async fn test_pending_interval_hits_timeout() {
    setup_test_logging();
    require_interpreter!(LanguageId::JavaScript);
    let harness = Harness::with_config(&config_with_timeout(
        LanguageId::JavaScript,
        Duration::from_secs(1),
    ));

    let result = harness
        .run(LanguageId::JavaScript, "setInterval(() => {}, 50);")
        .await;

    assert_eq!(result.exit_code, 124);
}
