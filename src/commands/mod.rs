use crate::engine::Engine;
use crate::handlers;
use crate::models::Direction;
use log::warn;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const HELP: &str = "Commands:
  vote <up|down> <voter-id> <name...>   vote in the active round
  status                                current score, timer and recent votes
  history                               every closed round
  close                                 close the active round now
  reset                                 start over from the seed score
  debug                                 history diagnostics
  repair                                drop duplicate history rounds
  help                                  this text
  quit                                  save and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Vote {
        direction: Direction,
        voter_id: String,
        name: String,
    },
    Status,
    History,
    Close,
    Reset,
    Debug,
    Repair,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let name = match parts.next() {
        Some(name) => name.to_ascii_lowercase(),
        None => return Err("No command provided".to_string()),
    };

    match name.as_str() {
        "vote" => {
            let direction = parts
                .next()
                .ok_or("Usage: vote <up|down> <voter-id> <name...>")?
                .parse::<Direction>()?;
            let voter_id = parts
                .next()
                .ok_or("Usage: vote <up|down> <voter-id> <name...>")?
                .to_string();
            // Missing names are the engine's call, so pass an empty one through
            let name = parts.collect::<Vec<_>>().join(" ");
            Ok(Command::Vote {
                direction,
                voter_id,
                name,
            })
        }
        "status" => Ok(Command::Status),
        "history" | "chart" => Ok(Command::History),
        "close" | "process" => Ok(Command::Close),
        "reset" => Ok(Command::Reset),
        "debug" => Ok(Command::Debug),
        "repair" | "cleanup" => Ok(Command::Repair),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: {}", other)),
    }
}

pub async fn handle_command(engine: &Engine, command: Command) -> String {
    match command {
        Command::Vote {
            direction,
            voter_id,
            name,
        } => {
            let round_number = engine.active_round_number().await;
            handlers::handle_vote(engine, round_number, &voter_id, &name, direction).await
        }
        Command::Status => handlers::handle_status(engine).await,
        Command::History => handlers::handle_history(engine).await,
        Command::Close => handlers::handle_close(engine).await,
        Command::Reset => handlers::handle_reset(engine).await,
        Command::Debug => handlers::handle_debug(engine).await,
        Command::Repair => handlers::handle_repair(engine).await,
        Command::Help => HELP.to_string(),
        Command::Quit => "Bye".to_string(),
    }
}

/// Reads commands line by line until `quit` or end of input, writing each reply.
/// Lines that are not valid UTF-8 are skipped; only a failing reader or writer ends the loop early.
pub async fn run_console<R, W>(engine: &Engine, mut input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if input.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(());
        }

        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("Ignoring console input that is not UTF-8: {}", e);
                output.write_all(b"Input must be UTF-8 text\n").await?;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let reply = match parse_command(line) {
            Ok(Command::Quit) => return Ok(()),
            Ok(command) => handle_command(engine, command).await,
            Err(message) => message,
        };
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
}
