//! Creative Studio sandbox - isolated multi-language code execution
//!
//! Runs untrusted JavaScript, TypeScript and Python programs in disposable
//! worker processes, one live session per language, and streams their output
//! to a terminal-style sink with a final exit status.

mod config;
mod error;
mod execution;
mod limits;
mod protocol;
pub mod runtime;
mod service;
mod sink;
mod types;

pub use config::{RuntimeConfig, ShareConfig, StudioConfig, ENV_NODE, ENV_PYTHON, ENV_SHARE_PORT};
pub use error::{Result, SandboxError};
pub use execution::{ControllerStatus, ExecutionController, SessionId};
pub use limits::{ExecutionLimits, DEFAULT_MAX_LINE_BYTES};
pub use protocol::{DecodedLine, FrameDecoder, WorkerFrame, FRAME_TOKEN_ENV};
pub use runtime::{
    Interpreter, JavaScriptRuntime, PythonRuntime, RuntimeAdapter, UnitEvent, UnitHandle, UnitKill,
};
pub use service::SandboxService;
pub use sink::{channel_color, OutputSink, RecordingSink, SinkEvent, TerminalSink};
pub use types::{
    exit_code, CompletionResult, ExecutionRequest, LanguageId, OutputChannel, OutputMessage,
};
