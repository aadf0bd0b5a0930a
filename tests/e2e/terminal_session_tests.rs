//! Full terminal sessions: service, both runtimes and the ANSI sink

use std::io::Write;
use std::sync::Arc;
use studio_sandbox::{
    ExecutionRequest, LanguageId, OutputSink, SandboxService, StudioConfig, TerminalSink,
};
use studio_tests::common::{find_interpreter, setup_test_logging, RUN_DEADLINE};

async fn wait(service: &SandboxService, language: LanguageId) -> i32 {
    tokio::time::timeout(RUN_DEADLINE, service.controller(language).wait_idle())
        .await
        .expect("execution did not finish")
        .expect("no session was started")
        .exit_code
}

#[tokio::test]
async fn test_mixed_language_session() {
    setup_test_logging();
    let have_node = find_interpreter(LanguageId::JavaScript).await.is_some();
    let have_python = find_interpreter(LanguageId::Python).await.is_some();
    if !have_node || !have_python {
        eprintln!("skipping: node and python3 are both required");
        return;
    }

    let sink = Arc::new(TerminalSink::new(Vec::new()));
    let service = SandboxService::new(sink.clone());
    sink.welcome();

    service.run(ExecutionRequest::new(
        LanguageId::JavaScript,
        "console.log('from node')",
    ));
    assert_eq!(wait(&service, LanguageId::JavaScript).await, 0);

    service.run(ExecutionRequest::new(
        LanguageId::Python,
        "print('from python')\nraise KeyError('k')",
    ));
    assert_eq!(wait(&service, LanguageId::Python).await, 1);

    let transcript = sink.transcript();
    let position = |needle: &str| {
        transcript
            .iter()
            .position(|l| l == needle)
            .unwrap_or_else(|| panic!("{needle:?} missing from {transcript:?}"))
    };
    assert!(position("$ node main.js") < position("from node"));
    assert!(position("from node") < position("$ python main.py"));
    assert!(position("$ python main.py") < position("from python"));
    assert!(position("from python") < position("Python Error: KeyError: 'k'"));
    assert_eq!(sink.status().map(|s| s.exit_code), Some(1));
    assert!(transcript.iter().any(|l| l.ends_with("Exit: 0")));
    assert!(transcript.iter().any(|l| l.ends_with("Exit: 1")));
}

#[tokio::test]
async fn test_missing_runtimes_fail_gracefully() {
    setup_test_logging();
    let mut config = StudioConfig::default();
    config.javascript.interpreters = vec!["/no/such/node".to_string()];
    config.python.interpreters = vec!["/no/such/python3".to_string()];

    let sink = Arc::new(TerminalSink::new(Vec::new()));
    let service = SandboxService::from_config(&config, sink.clone());

    service.run(ExecutionRequest::new(LanguageId::TypeScript, "let a: number = 1"));
    assert_eq!(wait(&service, LanguageId::JavaScript).await, 1);
    service.run(ExecutionRequest::new(LanguageId::Python, "print(1)"));
    assert_eq!(wait(&service, LanguageId::Python).await, 1);

    let transcript = sink.transcript();
    assert!(transcript
        .iter()
        .any(|l| l.starts_with("Failed to start execution: No javascript interpreter found")));
    assert!(transcript
        .iter()
        .any(|l| l.starts_with("Failed to load Python: No python interpreter found")));
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_run_file_and_clear() {
    setup_test_logging();
    if find_interpreter(LanguageId::JavaScript).await.is_none() {
        eprintln!("skipping: no javascript interpreter installed");
        return;
    }

    let mut file = tempfile::Builder::new().suffix(".js").tempfile().unwrap();
    writeln!(file, "console.log('file ok')").unwrap();

    let sink = Arc::new(TerminalSink::new(Vec::new()));
    let service = SandboxService::new(sink.clone());
    service.run_file(file.path(), None).await.unwrap();
    assert_eq!(wait(&service, LanguageId::JavaScript).await, 0);
    assert!(sink.transcript().contains(&"file ok".to_string()));
    assert!(sink.copy_selection().unwrap().contains("file ok"));

    sink.clear();
    assert!(sink.transcript().is_empty());
    assert!(sink.status().is_none());
}
