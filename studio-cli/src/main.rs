mod commands;
mod terminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use studio_sandbox::LanguageId;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Run JavaScript, TypeScript and Python in a sandboxed terminal")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.config/creative-studio/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one source file to completion
    Run {
        /// Source file (.js, .mjs, .cjs, .ts or .py)
        file: PathBuf,

        /// Override the language inferred from the extension
        #[arg(short, long)]
        language: Option<LanguageId>,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Interactive terminal (default if no subcommand provided)
    Terminal,
    /// Serve the snapshot sharing API
    ShareServer {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Terminal output owns stdout; keep routine logs quiet unless serving
    let default_level = match cli.command {
        Some(Commands::ShareServer { .. }) => "info",
        _ => "warn",
    };
    let log_guard = commands::init_logging(default_level, cli.verbose, cli.log_file.as_deref())?;
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Run {
            file,
            language,
            timeout,
        }) => {
            let code = commands::execute_run(&config, &file, language, timeout).await?;
            drop(log_guard);
            std::process::exit(code);
        }
        Some(Commands::ShareServer { host, port }) => {
            commands::execute_share_server(&config, host, port).await
        }
        Some(Commands::Terminal) | None => commands::execute_terminal(&config).await,
    }
}
