//! Execution controller: one live session per runtime, shared teardown

use crate::runtime::{RuntimeAdapter, UnitEvent, UnitKill};
use crate::sink::OutputSink;
use crate::types::{exit_code, CompletionResult, LanguageId, OutputChannel, OutputMessage};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Unique execution session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerStatus {
    /// No session has run yet
    #[default]
    Idle,
    /// Session accepted, isolated unit not yet up
    Starting(SessionId),
    /// Isolated unit is executing
    Running(SessionId),
    /// Last session ended with this result
    Finished {
        session: SessionId,
        result: CompletionResult,
    },
}

impl ControllerStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ControllerStatus::Starting(_) | ControllerStatus::Running(_))
    }

    pub fn session(&self) -> Option<SessionId> {
        match self {
            ControllerStatus::Idle => None,
            ControllerStatus::Starting(id) | ControllerStatus::Running(id) => Some(*id),
            ControllerStatus::Finished { session, .. } => Some(*session),
        }
    }
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Completed(i32),
    Failed,
    TimedOut,
    Stopped,
}

struct ActiveSession {
    id: SessionId,
    started: Instant,
    kill: Option<UnitKill>,
    driver: Option<JoinHandle<()>>,
    timeout: JoinHandle<()>,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveSession>,
}

struct Shared {
    adapter: Arc<dyn RuntimeAdapter>,
    sink: Arc<dyn OutputSink>,
    state: Mutex<ControllerState>,
    status: watch::Sender<ControllerStatus>,
}

/// Runs one program at a time on a runtime adapter and reports everything
/// it does to an output sink.
///
/// Cloning is cheap; clones drive the same controller.
#[derive(Clone)]
pub struct ExecutionController {
    shared: Arc<Shared>,
}

impl ExecutionController {
    pub fn new(adapter: Arc<dyn RuntimeAdapter>, sink: Arc<dyn OutputSink>) -> Self {
        let (status, _) = watch::channel(ControllerStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                adapter,
                sink,
                state: Mutex::new(ControllerState::default()),
                status,
            }),
        }
    }

    /// Start executing `source`, stopping any active session first.
    ///
    /// Returns as soon as the session is registered. Must be called from
    /// within a tokio runtime.
    pub fn run(&self, source: impl Into<String>) -> SessionId {
        let shared = &self.shared;
        let mut state = shared.lock();

        if let Some(previous) = state.active.take() {
            shared.teardown(previous, Teardown::Stopped);
        }

        let id = SessionId::new();
        let started = Instant::now();
        let timeout = shared.adapter.limits().timeout;
        tracing::info!(
            session_id = %id,
            language = %shared.adapter.language(),
            runtime = shared.adapter.name(),
            "Starting execution"
        );

        shared.sink.write(&shared.adapter.banner(), OutputChannel::Info);
        shared.status.send_replace(ControllerStatus::Starting(id));

        let guard = {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                shared.finish(id, Teardown::TimedOut);
            })
        };
        let driver = tokio::spawn(self.shared.clone().drive(id, source.into()));

        state.active = Some(ActiveSession {
            id,
            started,
            kill: None,
            driver: Some(driver),
            timeout: guard,
        });
        id
    }

    /// Hard-kill the active session, if any. Reports exit code 130.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if let Some(active) = state.active.take() {
            self.shared.teardown(active, Teardown::Stopped);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.borrow().is_active()
    }

    pub fn status(&self) -> ControllerStatus {
        self.shared.status.borrow().clone()
    }

    /// Watch status changes instead of polling [`Self::is_running`]
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.shared.status.subscribe()
    }

    /// Wait until no session is active.
    ///
    /// Returns the result of the last finished session, or `None` if nothing
    /// has run yet.
    pub async fn wait_idle(&self) -> Option<CompletionResult> {
        let mut status = self.subscribe();
        let settled = status.wait_for(|s| !s.is_active()).await.ok()?;
        match &*settled {
            ControllerStatus::Finished { result, .. } => Some(*result),
            _ => None,
        }
    }

    pub fn language(&self) -> LanguageId {
        self.shared.adapter.language()
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.shared.sink
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn drive(self: Arc<Self>, id: SessionId, source: String) {
        let handle = match self.adapter.start(&source).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Execution unit failed to start");
                let msg = OutputMessage::stderr(format!("Failed to start execution: {}", e));
                self.deliver(id, &msg);
                self.finish(id, Teardown::Failed);
                return;
            }
        };
        let (mut events, kill) = handle.into_parts();

        {
            let mut state = self.lock();
            match state.active.as_mut() {
                Some(active) if active.id == id => active.kill = Some(kill),
                _ => {
                    // Superseded while starting
                    kill.kill();
                    return;
                }
            }
            self.status.send_replace(ControllerStatus::Running(id));
        }

        while let Some(event) = events.recv().await {
            match event {
                UnitEvent::Output(msg) => {
                    if !self.deliver(id, &msg) {
                        return;
                    }
                }
                UnitEvent::Exited(code) => {
                    self.finish(id, Teardown::Completed(code));
                    return;
                }
                UnitEvent::Failed(reason) => {
                    tracing::warn!(session_id = %id, %reason, "Execution unit failed");
                    self.deliver(id, &OutputMessage::stderr(format!("Worker error: {}", reason)));
                    self.finish(id, Teardown::Failed);
                    return;
                }
            }
        }

        self.deliver(
            id,
            &OutputMessage::stderr("Worker error: execution unit closed unexpectedly"),
        );
        self.finish(id, Teardown::Failed);
    }

    /// Forward a message if `id` is still the active session.
    fn deliver(&self, id: SessionId, msg: &OutputMessage) -> bool {
        let state = self.lock();
        match &state.active {
            Some(active) if active.id == id => {
                self.sink.write(&msg.text, msg.channel);
                true
            }
            _ => {
                tracing::trace!(session_id = %id, "Dropping output from stale session");
                false
            }
        }
    }

    /// Tear down `id` unless another path already did.
    fn finish(&self, id: SessionId, reason: Teardown) {
        let mut state = self.lock();
        if state.active.as_ref().map(|a| a.id) != Some(id) {
            return;
        }
        if let Some(active) = state.active.take() {
            self.teardown(active, reason);
        }
    }

    /// Caller holds the state lock and has already detached `active`.
    fn teardown(&self, active: ActiveSession, reason: Teardown) {
        active.timeout.abort();
        if let Some(driver) = active.driver {
            driver.abort();
        }
        if let Some(kill) = active.kill {
            kill.kill();
        }

        let exit_code = match reason {
            Teardown::Completed(code) => code,
            Teardown::Failed => exit_code::PROGRAM_ERROR,
            Teardown::TimedOut => exit_code::TIMEOUT,
            Teardown::Stopped => exit_code::INTERRUPTED,
        };
        match reason {
            Teardown::TimedOut => self.sink.write(
                &format!(
                    "Execution timed out after {}",
                    format_budget(self.adapter.limits().timeout)
                ),
                OutputChannel::Info,
            ),
            Teardown::Stopped => self.sink.write("Execution stopped by user", OutputChannel::Info),
            Teardown::Completed(_) | Teardown::Failed => {}
        }

        let result = CompletionResult {
            exit_code,
            duration_ms: active.started.elapsed().as_millis() as u64,
        };
        self.sink.write("", OutputChannel::Stdout);
        self.sink.report_completion(&result);
        self.sink.write_prompt();

        tracing::info!(
            session_id = %active.id,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            reason = ?reason,
            "Execution finished"
        );
        self.status.send_replace(ControllerStatus::Finished {
            session: active.id,
            result,
        });
    }
}

fn format_budget(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
