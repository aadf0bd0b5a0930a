//! Process-backed isolated execution unit

use super::{UnitEvent, UnitHandle};
use crate::error::SandboxError;
use crate::limits::ExecutionLimits;
use crate::protocol::{
    frame_capacity, truncate_line, DecodedLine, FrameDecoder, WorkerFrame, FRAME_TOKEN_ENV,
    MAX_LINE_BYTES_ENV,
};
use crate::types::OutputMessage;
use crate::Result;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// Command line of a worker process
#[derive(Debug, Clone)]
pub struct UnitCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Written to the worker's stdin, then stdin is closed
    pub stdin: String,
}

impl UnitCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: String::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = input.into();
        self
    }
}

/// One worker process speaking the frame protocol on stdout
pub struct ProcessUnit {
    child: Child,
    decoder: FrameDecoder,
    max_line_bytes: usize,
}

impl ProcessUnit {
    /// Spawn the worker process. Its stdin receives `command.stdin`.
    pub fn launch(command: UnitCommand, limits: &ExecutionLimits) -> Result<Self> {
        let decoder = FrameDecoder::random();
        let program = command.program.display().to_string();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(FRAME_TOKEN_ENV, decoder.token())
            .env(MAX_LINE_BYTES_ENV, limits.max_line_bytes.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a kill also reaches anything the program spawned
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            program: program.clone(),
            source,
        })?;

        tracing::debug!(program = %program, pid = ?child.id(), "Worker process spawned");

        if let Some(mut stdin) = child.stdin.take() {
            let input = command.stdin;
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!(error = %e, "Worker closed stdin early");
                }
                // stdin dropped here so the worker sees EOF
            });
        }

        Ok(Self {
            child,
            decoder,
            max_line_bytes: limits.max_line_bytes,
        })
    }

    /// Spawn the worker and its pump task, returning the controller handle.
    pub fn spawn(command: UnitCommand, limits: &ExecutionLimits) -> Result<UnitHandle> {
        let unit = Self::launch(command, limits)?;
        let (handle, events, kill) = UnitHandle::channel();
        tokio::spawn(unit.pump(events, kill));
        Ok(handle)
    }

    /// Forward worker output until it exits or `kill` fires.
    ///
    /// The final event is `Exited` when the worker sent an exit frame and
    /// `Failed` otherwise. Nothing is sent after a kill.
    pub async fn pump(mut self, events: mpsc::Sender<UnitEvent>, mut kill: oneshot::Receiver<()>) {
        let (Some(stdout), Some(stderr)) = (self.child.stdout.take(), self.child.stderr.take())
        else {
            let _ = events
                .send(UnitEvent::Failed("worker pipes unavailable".to_string()))
                .await;
            self.terminate().await;
            return;
        };
        let capacity = frame_capacity(self.max_line_bytes);
        let mut stdout = LineReader::new(BufReader::new(stdout), capacity);
        let mut stderr = LineReader::new(BufReader::new(stderr), capacity);
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut reported_exit = None;

        while stdout_open || stderr_open {
            let event = tokio::select! {
                biased;
                _ = &mut kill => {
                    self.terminate().await;
                    return;
                }
                line = stdout.next_line(), if stdout_open => match line {
                    Some(line) => match self.decoder.decode(&line) {
                        DecodedLine::Frame(WorkerFrame::Exit { code }) => {
                            reported_exit = Some(code);
                            None
                        }
                        DecodedLine::Frame(WorkerFrame::Output { channel, text }) => {
                            Some(OutputMessage::new(channel, text))
                        }
                        DecodedLine::Raw(msg) => Some(msg),
                    },
                    None => {
                        stdout_open = false;
                        None
                    }
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Some(line) => Some(OutputMessage::stderr(line)),
                    None => {
                        stderr_open = false;
                        None
                    }
                },
            };

            if let Some(mut msg) = event {
                msg.text = truncate_line(msg.text, self.max_line_bytes);
                if events.send(UnitEvent::Output(msg)).await.is_err() {
                    // Controller went away
                    self.terminate().await;
                    return;
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = &mut kill => {
                self.terminate().await;
                return;
            }
            status = self.child.wait() => status,
        };

        let last = match (reported_exit, status) {
            (Some(code), _) => UnitEvent::Exited(code),
            (None, Ok(status)) => {
                UnitEvent::Failed(format!("worker exited unexpectedly ({})", status))
            }
            (None, Err(e)) => UnitEvent::Failed(format!("worker wait failed: {}", e)),
        };
        tracing::debug!(event = ?last, "Worker finished");
        let _ = events.send(last).await;
    }

    async fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: plain syscall; a negative pid addresses the worker's group
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Worker already gone");
        }
        let _ = self.child.wait().await;
    }
}

/// Splits a worker pipe into lines, holding at most `capacity` bytes of any
/// one line. The rest of an overlong line is consumed and dropped.
struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    capacity: usize,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            capacity,
        }
    }

    /// Next line without its terminator, tolerating invalid UTF-8. `None` at
    /// end of stream. Cancel safe: a partial line stays buffered.
    async fn next_line(&mut self) -> Option<String> {
        loop {
            let available = match self.inner.fill_buf().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(error = %e, "Worker pipe read failed");
                    return None;
                }
            };
            if available.is_empty() {
                if self.buf.is_empty() {
                    return None;
                }
                return Some(self.take_line());
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            let room = self.capacity.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

            let used = newline.map_or(available.len(), |i| i + 1);
            self.inner.consume(used);
            if newline.is_some() {
                return Some(self.take_line());
            }
        }
    }

    fn take_line(&mut self) -> String {
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}
