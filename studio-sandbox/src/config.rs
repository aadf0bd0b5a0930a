//! Configuration for the studio runtimes and share server

use crate::error::SandboxError;
use crate::limits::ExecutionLimits;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prepends a Node.js candidate
pub const ENV_NODE: &str = "STUDIO_NODE";
/// Prepends a Python candidate
pub const ENV_PYTHON: &str = "STUDIO_PYTHON";
/// Overrides the share server port
pub const ENV_SHARE_PORT: &str = "STUDIO_SHARE_PORT";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct StudioConfig {
    /// JavaScript and TypeScript runtime
    pub javascript: RuntimeConfig,
    /// Python runtime
    pub python: RuntimeConfig,
    /// Snapshot share server
    pub share: ShareConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            javascript: RuntimeConfig::javascript(),
            python: RuntimeConfig::python(),
            share: ShareConfig::default(),
        }
    }
}

/// Per-runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interpreter programs to try, in order
    pub interpreters: Vec<String>,
    /// Wall-clock budget per execution, e.g. "30s"
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Longest output line forwarded before truncation
    pub max_line_bytes: usize,
}

impl RuntimeConfig {
    pub fn javascript() -> Self {
        Self::from_limits(
            vec!["node".to_string(), "nodejs".to_string()],
            ExecutionLimits::javascript(),
        )
    }

    pub fn python() -> Self {
        Self::from_limits(
            vec!["python3".to_string(), "python".to_string()],
            ExecutionLimits::python(),
        )
    }

    fn from_limits(interpreters: Vec<String>, limits: ExecutionLimits) -> Self {
        Self {
            interpreters,
            timeout: limits.timeout,
            max_line_bytes: limits.max_line_bytes,
        }
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: self.timeout,
            max_line_bytes: self.max_line_bytes,
        }
    }

    fn prepend_interpreter(&mut self, program: String) {
        self.interpreters.retain(|p| *p != program);
        self.interpreters.insert(0, program);
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.interpreters.is_empty() {
            return Err(SandboxError::Config(format!(
                "[{}] interpreters must not be empty",
                section
            )));
        }
        if self.timeout.is_zero() {
            return Err(SandboxError::Config(format!(
                "[{}] timeout must be greater than zero",
                section
            )));
        }
        if self.max_line_bytes == 0 {
            return Err(SandboxError::Config(format!(
                "[{}] max_line_bytes must be greater than zero",
                section
            )));
        }
        Ok(())
    }
}

/// Share server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// On-disk layout. Every section and every field is optional; whatever is
/// left out keeps the per-runtime default.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    javascript: RuntimeSection,
    #[serde(default)]
    python: RuntimeSection,
    #[serde(default)]
    share: ShareConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimeSection {
    interpreters: Option<Vec<String>>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    max_line_bytes: Option<usize>,
}

impl RuntimeSection {
    fn over(self, defaults: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            interpreters: self.interpreters.unwrap_or(defaults.interpreters),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_line_bytes: self.max_line_bytes.unwrap_or(defaults.max_line_bytes),
        }
    }
}

impl From<ConfigFile> for StudioConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            javascript: file.javascript.over(RuntimeConfig::javascript()),
            python: file.python.over(RuntimeConfig::python()),
            share: file.share,
        }
    }
}

impl StudioConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist. Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::read(&path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: StudioConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SandboxError::Config("Cannot determine home directory".to_string()))?;

        Ok(home
            .join(".config")
            .join("creative-studio")
            .join("config.toml"))
    }

    /// Apply `STUDIO_*` overrides looked up through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(node) = var(ENV_NODE).filter(|v| !v.is_empty()) {
            self.javascript.prepend_interpreter(node);
        }
        if let Some(python) = var(ENV_PYTHON).filter(|v| !v.is_empty()) {
            self.python.prepend_interpreter(python);
        }
        if let Some(port) = var(ENV_SHARE_PORT) {
            self.share.port = port.trim().parse().map_err(|_| {
                SandboxError::Config(format!("{} is not a valid port: {}", ENV_SHARE_PORT, port))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.javascript.validate("javascript")?;
        self.python.validate("python")
    }
}
