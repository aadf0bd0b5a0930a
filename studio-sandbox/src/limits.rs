//! Execution limits applied to one session

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cap on one output line before it is truncated
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Limits for one execution session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Wall-clock budget before the session is force-stopped
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Longest output line forwarded to the sink, in bytes
    pub max_line_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::javascript()
    }
}

impl ExecutionLimits {
    /// JavaScript-family sessions: 30 seconds
    pub fn javascript() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Python sessions: 60 seconds, the extra budget covers runtime bootstrap
    pub fn python() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_line_bytes(mut self, bytes: usize) -> Self {
        self.max_line_bytes = bytes;
        self
    }
}
