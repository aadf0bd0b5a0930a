use crate::types::LanguageId;
use thiserror::Error;

/// Errors raised by the sandbox host itself.
///
/// Failures of the submitted program never show up here; they are reported
/// through the output sink as stderr lines and a non-zero exit code.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("No {language} interpreter found (tried: {})", tried.join(", "))]
    InterpreterNotFound {
        language: LanguageId,
        tried: Vec<String>,
    },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

impl From<toml::de::Error> for SandboxError {
    fn from(e: toml::de::Error) -> Self {
        SandboxError::Config(e.to_string())
    }
}
