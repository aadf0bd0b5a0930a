//! Terminal / output sink shared by all execution controllers

use crate::types::{CompletionResult, OutputChannel, OutputMessage};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const WHITE: &str = "\x1b[37m";
const GREEN: &str = "\x1b[32m";
const GREY: &str = "\x1b[90m";

/// Plain-text lines kept for copy support
const MAX_TRANSCRIPT_LINES: usize = 10_000;

/// Rendering surface for execution output.
///
/// Implementations must accept calls from several controllers at once and
/// must tolerate every method being called while no session is active.
pub trait OutputSink: Send + Sync {
    /// Append one line of output on `channel`
    fn write(&self, text: &str, channel: OutputChannel);

    /// Show a fresh shell prompt
    fn write_prompt(&self);

    /// Update the exit status readout
    fn report_completion(&self, result: &CompletionResult);

    /// Wipe the visible output and the status readout
    fn clear(&self) {}

    /// Viewport changed size
    fn resize(&self, _cols: u16, _rows: u16) {}

    /// Text currently selected for copying, if any
    fn copy_selection(&self) -> Option<String> {
        None
    }
}

/// ANSI colour used for a channel
pub fn channel_color(channel: OutputChannel) -> &'static str {
    match channel {
        OutputChannel::Stdout => WHITE,
        OutputChannel::Stderr => RED,
        OutputChannel::Info => CYAN,
    }
}

struct TerminalState<W> {
    writer: W,
    at_prompt: bool,
    cols: u16,
    rows: u16,
    status: Option<CompletionResult>,
    transcript: VecDeque<String>,
}

impl<W: Write> TerminalState<W> {
    fn emit(&mut self, rendered: &str) {
        if let Err(e) = self
            .writer
            .write_all(rendered.as_bytes())
            .and_then(|_| self.writer.flush())
        {
            tracing::debug!(error = %e, "Terminal write failed");
        }
    }

    fn emit_line(&mut self, rendered: &str, plain: &str) {
        let mut line = String::with_capacity(rendered.len() + 8);
        if self.at_prompt {
            // Overwrite the dangling prompt instead of appending to it
            line.push_str("\r\x1b[K");
            self.at_prompt = false;
        }
        line.push_str(rendered);
        line.push('\n');
        self.emit(&line);

        if self.transcript.len() >= MAX_TRANSCRIPT_LINES {
            self.transcript.pop_front();
        }
        self.transcript.push_back(plain.to_string());
    }
}

/// Terminal-style sink rendering ANSI-coloured output into any writer
pub struct TerminalSink<W: Write + Send> {
    state: Mutex<TerminalState<W>>,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(TerminalState {
                writer,
                at_prompt: false,
                cols: 80,
                rows: 24,
                status: None,
                transcript: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TerminalState<W>> {
        // A panic while rendering leaves the state usable
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Print the greeting shown when the terminal opens
    pub fn welcome(&self) {
        let mut state = self.lock();
        state.emit_line(
            &format!("{CYAN}Welcome to the Creative Studio terminal{RESET}"),
            "Welcome to the Creative Studio terminal",
        );
        state.emit_line(
            &format!("{GREY}Run a file to execute your code{RESET}"),
            "Run a file to execute your code",
        );
        state.emit_line("", "");
    }

    /// Last reported completion, cleared by [`OutputSink::clear`]
    pub fn status(&self) -> Option<CompletionResult> {
        self.lock().status
    }

    /// Current viewport size as `(cols, rows)`
    pub fn size(&self) -> (u16, u16) {
        let state = self.lock();
        (state.cols, state.rows)
    }

    /// Plain-text lines written since the last clear
    pub fn transcript(&self) -> Vec<String> {
        self.lock().transcript.iter().cloned().collect()
    }

    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
            .writer
    }
}

impl<W: Write + Send> OutputSink for TerminalSink<W> {
    fn write(&self, text: &str, channel: OutputChannel) {
        let color = channel_color(channel);
        let mut state = self.lock();
        for line in text.split('\n') {
            state.emit_line(&format!("{color}{line}{RESET}"), line);
        }
    }

    fn write_prompt(&self) {
        let mut state = self.lock();
        state.emit(&format!("{GREEN}$ {RESET}"));
        state.at_prompt = true;
    }

    fn report_completion(&self, result: &CompletionResult) {
        let code_color = if result.success() { GREEN } else { RED };
        let mut state = self.lock();
        state.status = Some(*result);
        let rendered = format!(
            "{GREY}Runtime: {}ms  {code_color}Exit: {}{RESET}",
            result.duration_ms, result.exit_code
        );
        let plain = format!("Runtime: {}ms  Exit: {}", result.duration_ms, result.exit_code);
        state.emit_line(&rendered, &plain);
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.emit("\x1b[2J\x1b[H");
        state.at_prompt = false;
        state.status = None;
        state.transcript.clear();
    }

    fn resize(&self, cols: u16, rows: u16) {
        let mut state = self.lock();
        state.cols = cols.max(1);
        state.rows = rows.max(1);
    }

    fn copy_selection(&self) -> Option<String> {
        let state = self.lock();
        if state.transcript.is_empty() {
            return None;
        }
        let visible = state.transcript.len().saturating_sub(state.rows as usize);
        let lines: Vec<&str> = state
            .transcript
            .iter()
            .skip(visible)
            .map(String::as_str)
            .collect();
        Some(lines.join("\n"))
    }
}

/// Everything a [`RecordingSink`] observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Output(OutputMessage),
    Prompt,
    Completion(CompletionResult),
    Cleared,
}

/// Sink that records events in arrival order
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Output messages only, in arrival order
    pub fn outputs(&self) -> Vec<OutputMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Output(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<CompletionResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Completion(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Text written on `channel`, in order
    pub fn lines(&self, channel: OutputChannel) -> Vec<String> {
        self.outputs()
            .into_iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.text)
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn write(&self, text: &str, channel: OutputChannel) {
        self.push(SinkEvent::Output(OutputMessage::new(channel, text)));
    }

    fn write_prompt(&self) {
        self.push(SinkEvent::Prompt);
    }

    fn report_completion(&self, result: &CompletionResult) {
        self.push(SinkEvent::Completion(*result));
    }

    fn clear(&self) {
        self.push(SinkEvent::Cleared);
    }
}
