//! Parsing of the line-oriented command prompt.

use std::path::PathBuf;

use roughly_types::Command;

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A registered command, by id or alias.
    Run(Command),
    /// Focus a document; drives indicator visibility.
    Open(PathBuf),
    /// No document focused.
    Close,
    /// Accept the pending restart prompt.
    Confirm,
    /// Dismiss the pending restart prompt.
    Dismiss,
    /// List the registered command ids.
    Ids,
    Help,
    Quit,
    Unknown(String),
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "open" if !rest.is_empty() => Input::Open(PathBuf::from(rest)),
        "close" => Input::Close,
        "confirm" | "y" | "yes" => Input::Confirm,
        "dismiss" | "n" | "no" => Input::Dismiss,
        "ids" | "commands" => Input::Ids,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        _ => match word.parse::<Command>() {
            Ok(command) if rest.is_empty() => Input::Run(command),
            _ => Input::Unknown(line.to_string()),
        },
    };
    Some(input)
}

pub const HELP: &str = "\
Commands:
  restart | start | stop | logs   run a server command (full ids also accepted)
  open <path>                     focus a document
  close                           focus nothing
  confirm | dismiss               answer a pending restart prompt
  ids                             list registered command ids
  quit                            stop the server and exit";
