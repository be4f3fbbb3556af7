//! Line commands accepted on stdin.

use doorlink_core::{Door, ModuleId};
use doorlink_protocol::CommandRequest;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status(ModuleId),
    Lock(ModuleId),
    Unlock(ModuleId),
    Info(ModuleId),
    Send(CommandRequest),
    Raw(String),
    Doors,
    Help,
    Quit,
}

/// A console line that could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(String);

pub const HELP: &str = "\
commands:
  status <module>                 query lock status
  lock <module>                   lock and wait for the lock to engage
  unlock <module>                 unlock and wait for the release
  info <module>                   door info snapshot
  send [module] [target] [action] correlated command (defaults D1 D0 STATUS)
  raw <text>                      send a line to the hub as is
  doors                           known door records
  help
  quit";

/// Parse one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<ConsoleCommand, ParseError>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    if word.is_empty() {
        return None;
    }

    let module = || {
        if rest.is_empty() {
            return Err(ParseError(format!("{word}: module id required")));
        }
        ModuleId::from_loose(rest).map_err(|e| ParseError(format!("{word}: {e}")))
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "status" => module().map(ConsoleCommand::Status),
        "lock" => module().map(ConsoleCommand::Lock),
        "unlock" => module().map(ConsoleCommand::Unlock),
        "info" => module().map(ConsoleCommand::Info),
        "send" => {
            let mut parts = rest.split_whitespace();
            CommandRequest::from_parts(parts.next(), parts.next(), parts.next())
                .map(ConsoleCommand::Send)
                .map_err(|e| ParseError(format!("send: {e}")))
        }
        "raw" if !rest.is_empty() => Ok(ConsoleCommand::Raw(rest.to_string())),
        "raw" => Err(ParseError("raw: nothing to send".to_string())),
        "doors" => Ok(ConsoleCommand::Doors),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(ParseError(format!("unknown command {other:?}, try help"))),
    };
    Some(command)
}

/// One JSON line for the `doors` listing: the door record plus liveness.
pub fn door_line(door: &Door, online: bool) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(door)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("online".to_string(), Value::Bool(online));
    }
    serde_json::to_string(&value)
}
