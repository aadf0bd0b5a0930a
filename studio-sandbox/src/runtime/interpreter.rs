//! Interpreter discovery

use crate::error::SandboxError;
use crate::types::LanguageId;
use crate::Result;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A host interpreter that answered `--version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: PathBuf,
    pub version: String,
}

impl Interpreter {
    /// Return the first candidate that runs `<candidate> --version` successfully.
    pub async fn probe(language: LanguageId, candidates: &[String]) -> Result<Self> {
        for candidate in candidates {
            let output = tokio::time::timeout(
                PROBE_TIMEOUT,
                Command::new(candidate)
                    .arg("--version")
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .output(),
            )
            .await;

            match output {
                Ok(Ok(out)) if out.status.success() => {
                    // Older interpreters print the version on stderr
                    let text = if out.stdout.is_empty() {
                        out.stderr
                    } else {
                        out.stdout
                    };
                    let version = String::from_utf8_lossy(&text).trim().to_string();
                    tracing::info!(%language, program = %candidate, %version, "Interpreter found");
                    return Ok(Self {
                        program: PathBuf::from(candidate),
                        version,
                    });
                }
                Ok(Ok(out)) => {
                    tracing::debug!(program = %candidate, status = %out.status, "Interpreter probe failed")
                }
                Ok(Err(e)) => {
                    tracing::debug!(program = %candidate, error = %e, "Interpreter not runnable")
                }
                Err(_) => tracing::warn!(program = %candidate, "Interpreter probe timed out"),
            }
        }

        Err(SandboxError::InterpreterNotFound {
            language,
            tried: candidates.to_vec(),
        })
    }
}
