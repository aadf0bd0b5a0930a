//! Python runs against a real CPython

use std::time::Duration;
use studio_sandbox::{
    ControllerStatus, ExecutionRequest, LanguageId, OutputChannel, OutputMessage, StudioConfig,
};
use studio_tests::common::{config_with_timeout, setup_test_logging, Harness};
use studio_tests::require_interpreter;

#[tokio::test]
async fn test_print_and_bootstrap_messages() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();

    let result = harness
        .run(
            LanguageId::Python,
            "import sys\nprint('hi')\nprint('bye', file=sys.stderr)",
        )
        .await;

    assert_eq!(result.exit_code, 0);
    let info = harness.sink.lines(OutputChannel::Info);
    assert_eq!(info[0], "$ python main.py");
    assert_eq!(info[1], "Loading Python runtime...");
    assert!(info[2].starts_with("Python runtime ready (Python 3"));
    assert!(harness
        .sink
        .outputs()
        .windows(2)
        .any(|w| w == [OutputMessage::stdout("hi"), OutputMessage::stderr("bye")]));
}

#[tokio::test]
async fn test_bootstrap_happens_once() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();

    harness.run(LanguageId::Python, "print(1)").await;
    harness.run(LanguageId::Python, "print(2)").await;

    let loading = harness
        .sink
        .lines(OutputChannel::Info)
        .into_iter()
        .filter(|l| l == "Loading Python runtime...")
        .count();
    assert_eq!(loading, 1);
}

#[tokio::test]
async fn test_exception_is_reported_with_type() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();

    let result = harness
        .run(LanguageId::Python, "print('before')\nraise ValueError('bad input')")
        .await;

    assert_eq!(result.exit_code, 1);
    assert!(harness
        .sink
        .lines(OutputChannel::Stdout)
        .contains(&"before".to_string()));
    assert_eq!(
        harness.sink.lines(OutputChannel::Stderr),
        vec!["Python Error: ValueError: bad input".to_string()]
    );
}

#[tokio::test]
async fn test_sys_exit_code_is_kept() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();

    let result = harness.run(LanguageId::Python, "import sys\nsys.exit(3)").await;
    assert_eq!(result.exit_code, 3);

    let result = harness.run(LanguageId::Python, "raise SystemExit").await;
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_line_buffering() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();

    harness
        .run(
            LanguageId::Python,
            "print('a\\n\\nb')\nprint('par', end='')\nprint('tial', end='')",
        )
        .await;

    let stdout: Vec<String> = harness.sink.lines(OutputChannel::Stdout);
    assert_eq!(
        stdout[..4],
        [
            "a".to_string(),
            String::new(),
            "b".to_string(),
            "partial".to_string()
        ]
    );
}

#[tokio::test]
async fn test_stop_kills_busy_loop() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::new();
    let controller = harness.service.controller(LanguageId::Python);

    harness
        .service
        .run(ExecutionRequest::new(LanguageId::Python, "while True:\n    pass"));
    let mut status = controller.subscribe();
    status
        .wait_for(|s| matches!(s, ControllerStatus::Running(_)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    controller.stop();

    let result = harness.wait(LanguageId::Python).await;
    assert_eq!(result.exit_code, 130);
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_timeout_kills_sleeping_program() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let harness = Harness::with_config(&config_with_timeout(
        LanguageId::Python,
        Duration::from_secs(2),
    ));

    let result = harness
        .run(LanguageId::Python, "import time\ntime.sleep(600)")
        .await;

    assert_eq!(result.exit_code, 124);
    assert!(harness
        .sink
        .lines(OutputChannel::Info)
        .contains(&"Execution timed out after 2s".to_string()));
}

#[tokio::test]
async fn test_missing_interpreter_fails_bootstrap() {
    setup_test_logging();
    let mut config = StudioConfig::default();
    config.python.interpreters = vec!["/no/such/python3".to_string()];
    let harness = Harness::with_config(&config);

    let result = harness.run(LanguageId::Python, "print(1)").await;

    assert_eq!(result.exit_code, 1);
    let stderr = harness.sink.lines(OutputChannel::Stderr);
    assert_eq!(stderr.len(), 1);
    assert!(stderr[0].starts_with("Failed to load Python: No python interpreter found"));

    // The controller stays usable
    let result = harness.run(LanguageId::Python, "print(2)").await;
    assert_eq!(result.exit_code, 1);
    assert_eq!(harness.sink.completions().len(), 2);
}

#[tokio::test]
async fn test_huge_line_is_truncated() {
    setup_test_logging();
    require_interpreter!(LanguageId::Python);
    let mut config = StudioConfig::default();
    config.python.max_line_bytes = 1024;
    let harness = Harness::with_config(&config);

    let result = harness
        .run(LanguageId::Python, "print('x' * 5_000_000)\nprint('done')")
        .await;

    assert_eq!(result.exit_code, 0);
    let stdout = harness.sink.lines(OutputChannel::Stdout);
    assert_eq!(stdout[0], format!("{}…[truncated]", "x".repeat(1024)));
    assert_eq!(stdout[1], "done");
}
