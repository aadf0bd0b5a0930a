//! Sandbox service - main entry point

use crate::config::StudioConfig;
use crate::error::SandboxError;
use crate::execution::{ExecutionController, SessionId};
use crate::runtime::typescript::strip_type_annotations;
use crate::runtime::{JavaScriptRuntime, PythonRuntime, RuntimeAdapter};
use crate::sink::OutputSink;
use crate::types::{ExecutionRequest, LanguageId};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// One controller per runtime language, all writing to a single sink
pub struct SandboxService {
    sink: Arc<dyn OutputSink>,
    javascript: ExecutionController,
    python: ExecutionController,
}

impl SandboxService {
    /// Create a service with default interpreters and limits
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self::with_runtimes(
            Arc::new(JavaScriptRuntime::new()),
            Arc::new(PythonRuntime::new()),
            sink,
        )
    }

    /// Create a service from loaded configuration
    pub fn from_config(config: &StudioConfig, sink: Arc<dyn OutputSink>) -> Self {
        let javascript = JavaScriptRuntime::with_interpreters(config.javascript.interpreters.clone())
            .with_limits(config.javascript.limits());
        let python = PythonRuntime::with_interpreters(config.python.interpreters.clone())
            .with_limits(config.python.limits());
        Self::with_runtimes(Arc::new(javascript), Arc::new(python), sink)
    }

    /// Create a service over arbitrary adapters
    pub fn with_runtimes(
        javascript: Arc<dyn RuntimeAdapter>,
        python: Arc<dyn RuntimeAdapter>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            javascript: ExecutionController::new(javascript, sink.clone()),
            python: ExecutionController::new(python, sink.clone()),
            sink,
        }
    }

    /// Execute a request on the controller for its language
    pub fn run(&self, request: ExecutionRequest) -> SessionId {
        tracing::debug!(
            language = %request.language,
            code_len = request.source.len(),
            "Dispatching execution"
        );
        let source = match request.language {
            LanguageId::TypeScript => strip_type_annotations(&request.source),
            _ => request.source,
        };
        self.controller(request.language).run(source)
    }

    /// Read a single source file and execute it.
    ///
    /// The language is inferred from the extension unless given.
    pub async fn run_file(&self, path: &Path, language: Option<LanguageId>) -> Result<SessionId> {
        let language = match language {
            Some(language) => language,
            None => LanguageId::from_path(path).ok_or_else(|| {
                SandboxError::UnsupportedLanguage(path.display().to_string())
            })?,
        };
        let source = tokio::fs::read_to_string(path).await?;
        Ok(self.run(ExecutionRequest::new(language, source)))
    }

    /// Stop whatever is running on every controller
    pub fn stop(&self) {
        self.javascript.stop();
        self.python.stop();
    }

    pub fn is_running(&self) -> bool {
        self.javascript.is_running() || self.python.is_running()
    }

    /// Controller executing `language`; TypeScript maps to JavaScript
    pub fn controller(&self, language: LanguageId) -> &ExecutionController {
        match language.runtime_language() {
            LanguageId::Python => &self.python,
            _ => &self.javascript,
        }
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }
}
