//! Runtime adapter trait and implementations

mod interpreter;
mod javascript;
mod process;
mod python;
pub mod typescript;

use crate::limits::ExecutionLimits;
use crate::types::{LanguageId, OutputMessage};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

pub use interpreter::Interpreter;
pub use javascript::JavaScriptRuntime;
pub use process::{ProcessUnit, UnitCommand};
pub use python::PythonRuntime;

/// Event emitted by a running isolated unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    /// Program or bootstrap output
    Output(OutputMessage),
    /// The program finished and reported its own exit code
    Exited(i32),
    /// The isolation boundary failed outside the program's error handling
    Failed(String),
}

/// Capability to hard-kill one isolated unit.
///
/// Dropping it kills the unit as well.
#[derive(Debug)]
pub struct UnitKill(oneshot::Sender<()>);

impl UnitKill {
    pub fn kill(self) {
        let _ = self.0.send(());
    }
}

/// Handle to a started isolated unit
#[derive(Debug)]
pub struct UnitHandle {
    pub events: mpsc::Receiver<UnitEvent>,
    pub kill: UnitKill,
}

impl UnitHandle {
    /// Create the channels connecting a unit to its controller.
    ///
    /// The unit side gets the event sender and a receiver that resolves
    /// when the controller kills the unit or drops its handle.
    pub fn channel() -> (Self, mpsc::Sender<UnitEvent>, oneshot::Receiver<()>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (kill_tx, kill_rx) = oneshot::channel();
        (
            Self {
                events: event_rx,
                kill: UnitKill(kill_tx),
            },
            event_tx,
            kill_rx,
        )
    }

    pub fn into_parts(self) -> (mpsc::Receiver<UnitEvent>, UnitKill) {
        (self.events, self.kill)
    }
}

/// Language-specific bootstrap of an isolated execution unit
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Language this adapter executes
    fn language(&self) -> LanguageId;

    /// Get runtime name
    fn name(&self) -> &str;

    /// Simulated shell line announcing a run
    fn banner(&self) -> String;

    /// Limits applied to every session of this runtime
    fn limits(&self) -> &ExecutionLimits;

    /// Start executing `source` in a fresh isolated unit.
    ///
    /// Errors returned here are isolation-boundary failures; program and
    /// bootstrap failures are reported through the unit's events.
    async fn start(&self, source: &str) -> Result<UnitHandle>;
}
