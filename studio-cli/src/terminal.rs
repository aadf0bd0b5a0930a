//! Commands accepted by the interactive terminal

use std::path::PathBuf;
use std::str::FromStr;
use studio_sandbox::LanguageId;

pub const HELP: &str = "\
Commands:
  run <file> [language]  Run a source file, stopping any active run
  stop                   Stop the active run
  status                 Show controller status
  clear                  Clear the screen
  help                   Show this help
  exit                   Stop everything and quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    Run {
        file: PathBuf,
        language: Option<LanguageId>,
    },
    Stop,
    Status,
    Clear,
    Help,
    Exit,
    /// Blank input line
    Empty,
}

impl FromStr for TerminalCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(TerminalCommand::Empty);
        };

        let parsed = match command {
            "run" => {
                let file = words
                    .next()
                    .ok_or_else(|| "usage: run <file> [language]".to_string())?;
                let language = words
                    .next()
                    .map(|l| l.parse::<LanguageId>().map_err(|e| e.to_string()))
                    .transpose()?;
                TerminalCommand::Run {
                    file: PathBuf::from(file),
                    language,
                }
            }
            "stop" => TerminalCommand::Stop,
            "status" => TerminalCommand::Status,
            "clear" | "cls" => TerminalCommand::Clear,
            "help" | "?" => TerminalCommand::Help,
            "exit" | "quit" => TerminalCommand::Exit,
            other => return Err(format!("Unknown command: {} (try 'help')", other)),
        };

        if let Some(extra) = words.next() {
            return Err(format!("Unexpected argument: {}", extra));
        }
        Ok(parsed)
    }
}
