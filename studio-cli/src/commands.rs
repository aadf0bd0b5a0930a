//! CLI command implementations

use crate::terminal::{TerminalCommand, HELP};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use studio_sandbox::{
    exit_code, ControllerStatus, LanguageId, OutputChannel, OutputSink, SandboxService,
    StudioConfig, TerminalSink,
};
use studio_share::ShareState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

/// Initialise tracing on stderr, or on `log_file` when given.
///
/// The returned guard must be held until exit so buffered file output is
/// flushed.
pub fn init_logging(
    default_level: &str,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { default_level };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "studio={},studio_sandbox={},studio_share={}",
            level, level, level
        ))
    });

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file {} does not name a file", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .with(filter)
                .try_init()
                .context("Failed to initialise logging")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(true),
                )
                .with(filter)
                .try_init()
                .context("Failed to initialise logging")?;
            Ok(None)
        }
    }
}

/// Load configuration from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<StudioConfig> {
    match path {
        Some(path) => StudioConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => StudioConfig::load().context("Failed to load configuration"),
    }
}

/// Execute a single file and return its exit code
pub async fn execute_run(
    config: &StudioConfig,
    file: &Path,
    language: Option<LanguageId>,
    timeout_secs: Option<u64>,
) -> Result<i32> {
    let mut config = config.clone();
    if let Some(secs) = timeout_secs {
        anyhow::ensure!(secs > 0, "--timeout must be greater than zero");
        config.javascript.timeout = Duration::from_secs(secs);
        config.python.timeout = Duration::from_secs(secs);
    }

    let language = match language {
        Some(language) => language,
        None => LanguageId::from_path(file).with_context(|| {
            format!(
                "Cannot infer the language of {}; pass --language",
                file.display()
            )
        })?,
    };

    let service = SandboxService::from_config(&config, Arc::new(TerminalSink::stdout()));
    service
        .run_file(file, Some(language))
        .await
        .with_context(|| format!("Failed to run {}", file.display()))?;

    let controller = service.controller(language);
    let result = tokio::select! {
        result = controller.wait_idle() => result,
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupted, stopping execution");
            service.stop();
            controller.wait_idle().await
        }
    };
    // Terminate the trailing prompt line
    println!();

    Ok(result
        .map(|r| r.exit_code)
        .unwrap_or(exit_code::PROGRAM_ERROR))
}

/// Interactive terminal reading commands from stdin
pub async fn execute_terminal(config: &StudioConfig) -> Result<()> {
    let sink = Arc::new(TerminalSink::stdout());
    let service = SandboxService::from_config(config, sink.clone());
    sink.welcome();
    sink.write_prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read terminal input")?,
            _ = tokio::signal::ctrl_c() => {
                if service.is_running() {
                    service.stop();
                } else {
                    sink.write_prompt();
                }
                continue;
            }
        };
        // End of input
        let Some(line) = line else { break };

        match line.parse::<TerminalCommand>() {
            Ok(TerminalCommand::Empty) => sink.write_prompt(),
            Ok(TerminalCommand::Run { file, language }) => {
                if let Err(e) = service.run_file(&file, language).await {
                    sink.write(&format!("{}: {}", file.display(), e), OutputChannel::Stderr);
                    sink.write_prompt();
                }
            }
            Ok(TerminalCommand::Stop) => {
                if service.is_running() {
                    service.stop();
                } else {
                    sink.write("No execution is running", OutputChannel::Info);
                    sink.write_prompt();
                }
            }
            Ok(TerminalCommand::Status) => {
                for language in [LanguageId::JavaScript, LanguageId::Python] {
                    let status = service.controller(language).status();
                    sink.write(&describe_status(language, &status), OutputChannel::Info);
                }
                sink.write_prompt();
            }
            Ok(TerminalCommand::Clear) => {
                sink.clear();
                sink.write_prompt();
            }
            Ok(TerminalCommand::Help) => {
                sink.write(HELP, OutputChannel::Info);
                sink.write_prompt();
            }
            Ok(TerminalCommand::Exit) => break,
            Err(message) => {
                sink.write(&message, OutputChannel::Stderr);
                sink.write_prompt();
            }
        }
    }

    service.stop();
    println!();
    Ok(())
}

/// Serve the share API until interrupted
pub async fn execute_share_server(
    config: &StudioConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.share.host.clone());
    let port = port.unwrap_or(config.share.port);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind share server to {}:{}", host, port))?;

    tokio::select! {
        result = studio_share::start_server(listener, ShareState::in_memory()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down share server");
            Ok(())
        }
    }
}

fn describe_status(language: LanguageId, status: &ControllerStatus) -> String {
    match status {
        ControllerStatus::Idle => format!("{}: idle", language),
        ControllerStatus::Starting(id) => format!("{}: starting (session {})", language, id),
        ControllerStatus::Running(id) => format!("{}: running (session {})", language, id),
        ControllerStatus::Finished { result, .. } => format!(
            "{}: finished, exit {} in {}ms",
            language, result.exit_code, result.duration_ms
        ),
    }
}
