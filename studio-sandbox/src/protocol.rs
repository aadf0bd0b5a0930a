//! Line protocol spoken by worker bootstraps over their stdout
//!
//! Every structured line is `<token><json>` where `token` is a random value
//! handed to the worker through [`FRAME_TOKEN_ENV`]. Lines without the token
//! are raw output and are forwarded as plain stdout.

use crate::types::{OutputChannel, OutputMessage};
use serde::{Deserialize, Serialize};

/// Environment variable carrying the frame token into the worker
pub const FRAME_TOKEN_ENV: &str = "STUDIO_FRAME_TOKEN";

/// Environment variable carrying `max_line_bytes`, so bootstraps clip
/// output text before framing it
pub const MAX_LINE_BYTES_ENV: &str = "STUDIO_MAX_LINE_BYTES";

/// Worst-case JSON escaping of one character (a `\uXXXX` surrogate pair)
const ESCAPED_CHAR_BYTES: usize = 12;

/// Bytes of one worker line the host will hold in memory. Enough for a
/// frame whose text was clipped to `max_line_bytes` characters; anything
/// beyond is discarded while reading.
pub fn frame_capacity(max_line_bytes: usize) -> usize {
    max_line_bytes
        .saturating_add(1)
        .saturating_mul(ESCAPED_CHAR_BYTES)
        .saturating_add(256)
}

/// Structured message sent by a worker bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerFrame {
    Output { channel: OutputChannel, text: String },
    Exit { code: i32 },
}

/// Decoded stdout line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    Frame(WorkerFrame),
    Raw(OutputMessage),
}

/// Splits worker stdout into frames and raw output
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    token: String,
}

impl FrameDecoder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Generate a decoder with a fresh random token.
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn decode(&self, line: &str) -> DecodedLine {
        let Some(payload) = line.strip_prefix(self.token.as_str()) else {
            return DecodedLine::Raw(OutputMessage::stdout(line));
        };
        match serde_json::from_str::<WorkerFrame>(payload) {
            Ok(frame) => DecodedLine::Frame(frame),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed worker frame");
                DecodedLine::Raw(OutputMessage::stdout(payload))
            }
        }
    }
}

/// Cut `line` to at most `max_bytes`, respecting UTF-8 boundaries.
pub fn truncate_line(mut line: String, max_bytes: usize) -> String {
    if line.len() <= max_bytes {
        return line;
    }
    let mut cut = max_bytes;
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    line.truncate(cut);
    line.push_str("…[truncated]");
    line
}
