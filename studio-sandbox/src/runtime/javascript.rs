//! JavaScript runtime backed by a Node.js worker process

use super::interpreter::Interpreter;
use super::process::{ProcessUnit, UnitCommand};
use super::{RuntimeAdapter, UnitHandle};
use crate::limits::ExecutionLimits;
use crate::types::LanguageId;
use crate::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Worker bootstrap. Reads the program from stdin and runs it once in a
/// fresh `vm` context whose console emits frames instead of printing. The
/// exit frame goes out once the host event loop has drained, so timers the
/// program scheduled still run.
const BOOTSTRAP: &str = r#"
'use strict';
const fs = require('fs');
const util = require('util');
const vm = require('vm');

const TOKEN = process.env.STUDIO_FRAME_TOKEN || '';
const LIMIT = Number(process.env.STUDIO_MAX_LINE_BYTES) || 0;
delete process.env.STUDIO_FRAME_TOKEN;
delete process.env.STUDIO_MAX_LINE_BYTES;

// Keep one unit past the limit so the host still marks the line truncated
const clip = (text) => {
  if (!LIMIT || text.length <= LIMIT) return text;
  let end = LIMIT + 1;
  const unit = text.charCodeAt(end - 1);
  if (unit >= 0xd800 && unit <= 0xdbff) end -= 1;
  return text.slice(0, end);
};

const send = (frame) => fs.writeSync(1, TOKEN + JSON.stringify(frame) + '\n');
const emit = (channel, text) => send({ type: 'output', channel, text: clip(text) });
const format = (args) =>
  args.map((a) => (typeof a === 'string' ? a : util.inspect(a, { depth: 4 }))).join(' ');
const describe = (err) =>
  err !== null && typeof err === 'object' && 'message' in err ? String(err.message) : String(err);

const sandboxConsole = Object.freeze({
  log: (...args) => emit('stdout', format(args)),
  debug: (...args) => emit('stdout', format(args)),
  info: (...args) => emit('stdout', 'INFO: ' + format(args)),
  warn: (...args) => emit('stdout', 'WARNING: ' + format(args)),
  error: (...args) => emit('stderr', format(args)),
});

const HOST_GLOBALS = [
  'setTimeout', 'setInterval', 'setImmediate',
  'clearTimeout', 'clearInterval', 'clearImmediate',
  'queueMicrotask', 'structuredClone',
  'TextEncoder', 'TextDecoder', 'URL', 'URLSearchParams',
  'atob', 'btoa',
];
const sandbox = { console: sandboxConsole };
for (const name of HOST_GLOBALS) {
  if (name in globalThis) sandbox[name] = globalThis[name];
}

process.on('uncaughtException', (err) => emit('stderr', 'Error: ' + describe(err)));
process.on('unhandledRejection', (reason) => emit('stderr', 'Uncaught (in promise): ' + describe(reason)));

let code = 0;
try {
  const source = fs.readFileSync(0, 'utf8');
  const context = vm.createContext(sandbox);
  new vm.Script(source, { filename: 'main.js' }).runInContext(context);
} catch (err) {
  emit('stderr', 'Runtime Error: ' + describe(err));
  code = 1;
}

process.exitCode = code;
process.once('beforeExit', () => send({ type: 'exit', code }));
"#;

/// Runs JavaScript (and stripped TypeScript) in a Node.js worker
pub struct JavaScriptRuntime {
    candidates: Vec<String>,
    limits: ExecutionLimits,
    interpreter: OnceCell<Interpreter>,
}

impl JavaScriptRuntime {
    pub fn new() -> Self {
        Self::with_interpreters(vec!["node".to_string(), "nodejs".to_string()])
    }

    /// Use these interpreter candidates, tried in order
    pub fn with_interpreters(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            limits: ExecutionLimits::javascript(),
            interpreter: OnceCell::new(),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Interpreter resolved by the first run, if any
    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.interpreter.get()
    }
}

impl Default for JavaScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeAdapter for JavaScriptRuntime {
    fn language(&self) -> LanguageId {
        LanguageId::JavaScript
    }

    fn name(&self) -> &str {
        "node"
    }

    fn banner(&self) -> String {
        "$ node main.js".to_string()
    }

    fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    async fn start(&self, source: &str) -> Result<UnitHandle> {
        let interpreter = self
            .interpreter
            .get_or_try_init(|| Interpreter::probe(LanguageId::JavaScript, &self.candidates))
            .await?;

        let command = UnitCommand::new(&interpreter.program)
            .arg("-e")
            .arg(BOOTSTRAP)
            .stdin(source);
        ProcessUnit::spawn(command, &self.limits)
    }
}
