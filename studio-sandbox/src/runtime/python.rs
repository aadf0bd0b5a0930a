//! Python runtime backed by a CPython worker process

use super::interpreter::Interpreter;
use super::process::{ProcessUnit, UnitCommand};
use super::{RuntimeAdapter, UnitEvent, UnitHandle};
use crate::error::SandboxError;
use crate::limits::ExecutionLimits;
use crate::types::{exit_code, LanguageId, OutputMessage};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, OnceCell};

/// Worker bootstrap. Redirects the standard streams into frames, then runs
/// the program read from stdin as `__main__`.
const BOOTSTRAP: &str = r##"
import json as _json
import os as _os
import sys as _sys

_token = _os.environ.pop("STUDIO_FRAME_TOKEN", "")
_limit = int(_os.environ.pop("STUDIO_MAX_LINE_BYTES", "0") or 0)
_real_stdout = _sys.__stdout__


def _send(frame):
    _real_stdout.write(_token + _json.dumps(frame) + "\n")
    _real_stdout.flush()


def _emit(channel, text):
    # One character past the limit lets the host mark the line truncated
    if _limit and len(text) > _limit:
        text = text[: _limit + 1]
    _send({"type": "output", "channel": channel, "text": text})


class _TerminalCapture:
    encoding = "utf-8"

    def __init__(self, channel):
        self.channel = channel
        self.pending = ""

    def write(self, text):
        self.pending += str(text)
        while "\n" in self.pending:
            line, self.pending = self.pending.split("\n", 1)
            _emit(self.channel, line)
        return len(text)

    def flush(self):
        if self.pending:
            _emit(self.channel, self.pending)
            self.pending = ""

    def isatty(self):
        return False

    def writable(self):
        return True


_source = _sys.stdin.read()
_sys.stdin = open(_os.devnull)
_sys.stdout = _TerminalCapture("stdout")
_sys.stderr = _TerminalCapture("stderr")

_code = 0
try:
    exec(compile(_source, "main.py", "exec"), {"__name__": "__main__", "__builtins__": __builtins__})
except SystemExit as _exit:
    if _exit.code is None:
        _code = 0
    elif isinstance(_exit.code, int):
        _code = _exit.code
    else:
        _sys.stderr.write(str(_exit.code) + "\n")
        _code = 1
except BaseException as _err:
    _sys.stdout.flush()
    _sys.stderr.write("Python Error: %s: %s\n" % (type(_err).__name__, _err))
    _code = 1
finally:
    _sys.stdout.flush()
    _sys.stderr.flush()

_send({"type": "exit", "code": _code})
_os._exit(_code)
"##;

/// Runs Python in a CPython worker.
///
/// The interpreter is discovered on first use; discovery is shared across
/// sessions and never runs twice concurrently.
pub struct PythonRuntime {
    inner: Arc<PythonInner>,
}

struct PythonInner {
    candidates: Vec<String>,
    limits: ExecutionLimits,
    interpreter: OnceCell<Interpreter>,
}

impl PythonRuntime {
    pub fn new() -> Self {
        Self::with_interpreters(vec!["python3".to_string(), "python".to_string()])
    }

    /// Use these interpreter candidates, tried in order
    pub fn with_interpreters(candidates: Vec<String>) -> Self {
        Self {
            inner: Arc::new(PythonInner {
                candidates,
                limits: ExecutionLimits::python(),
                interpreter: OnceCell::new(),
            }),
        }
    }

    pub fn with_limits(self, limits: ExecutionLimits) -> Self {
        Self {
            inner: Arc::new(PythonInner {
                candidates: self.inner.candidates.clone(),
                limits,
                interpreter: OnceCell::new(),
            }),
        }
    }

    /// Interpreter resolved by the first run, if any
    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.inner.interpreter.get()
    }
}

impl Default for PythonRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonInner {
    /// Bootstrap the runtime if needed, then run the worker to completion.
    async fn drive(
        self: Arc<Self>,
        source: String,
        events: mpsc::Sender<UnitEvent>,
        mut kill: oneshot::Receiver<()>,
    ) {
        let ready = tokio::select! {
            biased;
            // Dropping the bootstrap future leaves the cell empty; nothing
            // half-initialised survives a stop.
            _ = &mut kill => return,
            ready = self.bootstrap(&events) => ready,
        };

        let interpreter = match ready {
            Ok(interpreter) => interpreter,
            Err(e) => {
                tracing::warn!(error = %e, "Python bootstrap failed");
                let _ = events
                    .send(UnitEvent::Output(OutputMessage::stderr(format!(
                        "Failed to load Python: {}",
                        e
                    ))))
                    .await;
                let _ = events.send(UnitEvent::Exited(exit_code::PROGRAM_ERROR)).await;
                return;
            }
        };

        let command = UnitCommand::new(&interpreter.program)
            .arg("-u")
            .arg("-c")
            .arg(BOOTSTRAP)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUNBUFFERED", "1")
            .stdin(source);

        match ProcessUnit::launch(command, &self.limits) {
            Ok(unit) => unit.pump(events, kill).await,
            Err(e) => {
                let _ = events.send(UnitEvent::Failed(e.to_string())).await;
            }
        }
    }

    async fn bootstrap(&self, events: &mpsc::Sender<UnitEvent>) -> Result<Interpreter> {
        if let Some(interpreter) = self.interpreter.get() {
            return Ok(interpreter.clone());
        }
        let interpreter = self
            .interpreter
            .get_or_try_init(|| async {
                let _ = events
                    .send(UnitEvent::Output(OutputMessage::info(
                        "Loading Python runtime...",
                    )))
                    .await;
                let interpreter =
                    Interpreter::probe(LanguageId::Python, &self.candidates).await?;
                let _ = events
                    .send(UnitEvent::Output(OutputMessage::info(format!(
                        "Python runtime ready ({})",
                        interpreter.version
                    ))))
                    .await;
                Ok::<_, SandboxError>(interpreter)
            })
            .await?;
        Ok(interpreter.clone())
    }
}

#[async_trait]
impl RuntimeAdapter for PythonRuntime {
    fn language(&self) -> LanguageId {
        LanguageId::Python
    }

    fn name(&self) -> &str {
        "python"
    }

    fn banner(&self) -> String {
        "$ python main.py".to_string()
    }

    fn limits(&self) -> &ExecutionLimits {
        &self.inner.limits
    }

    async fn start(&self, source: &str) -> Result<UnitHandle> {
        let (handle, events, kill) = UnitHandle::channel();
        tokio::spawn(self.inner.clone().drive(source.to_string(), events, kill));
        Ok(handle)
    }
}
