//! Core types for sandbox execution

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Reserved exit codes shared by every runtime adapter.
pub mod exit_code {
    /// Program finished normally
    pub const SUCCESS: i32 = 0;
    /// Program raised, or the isolation boundary failed
    pub const PROGRAM_ERROR: i32 = 1;
    /// Execution exceeded its time budget
    pub const TIMEOUT: i32 = 124;
    /// Execution stopped by the user (SIGINT convention)
    pub const INTERRUPTED: i32 = 130;
}

/// Languages the sandbox can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    JavaScript,
    /// Stripped of annotations and executed as JavaScript
    TypeScript,
    Python,
}

impl LanguageId {
    /// Infer the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(LanguageId::JavaScript),
            "ts" => Some(LanguageId::TypeScript),
            "py" => Some(LanguageId::Python),
            _ => None,
        }
    }

    /// The language whose runtime actually executes this language.
    pub fn runtime_language(self) -> Self {
        match self {
            LanguageId::TypeScript => LanguageId::JavaScript,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageId::JavaScript => "javascript",
            LanguageId::TypeScript => "typescript",
            LanguageId::Python => "python",
        }
    }
}

impl std::fmt::Display for LanguageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "js" | "javascript" | "node" => Ok(LanguageId::JavaScript),
            "ts" | "typescript" => Ok(LanguageId::TypeScript),
            "py" | "python" | "python3" => Ok(LanguageId::Python),
            other => Err(SandboxError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Request to execute code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The code to execute
    pub source: String,

    /// Language of `source`
    pub language: LanguageId,
}

impl ExecutionRequest {
    pub fn new(language: LanguageId, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language,
        }
    }
}

/// Output stream a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputChannel {
    Stdout,
    Stderr,
    /// Host-generated status lines (banners, bootstrap progress, stop notices)
    Info,
}

/// One chunk of program or host output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMessage {
    pub channel: OutputChannel,
    pub text: String,
}

impl OutputMessage {
    pub fn new(channel: OutputChannel, text: impl Into<String>) -> Self {
        Self {
            channel,
            text: text.into(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(OutputChannel::Stdout, text)
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(OutputChannel::Stderr, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(OutputChannel::Info, text)
    }
}

/// Final report of one execution session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Exit code, see [`exit_code`]
    pub exit_code: i32,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl CompletionResult {
    /// Check if execution succeeded
    pub fn success(&self) -> bool {
        self.exit_code == exit_code::SUCCESS
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == exit_code::TIMEOUT
    }

    pub fn interrupted(&self) -> bool {
        self.exit_code == exit_code::INTERRUPTED
    }
}
