//! Slash command parsing for the chat loop.
//!
//! Commands start with `/`; anything else is sent as a chat message.

use std::io::{self, Write};

use console::style;

/// Messages shown by `/history` when no count is given.
pub const DEFAULT_HISTORY_COUNT: usize = 20;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Reprint the last N messages of the session.
    History(usize),
    /// Show connection and delivery state.
    Status,
    /// Clear the terminal screen.
    Clear,
    /// Leave the session and exit.
    Exit,
    /// Unknown command or bad argument, with the text to show.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), Some(arg.trim())),
        None => (trimmed.to_lowercase(), None),
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/status" => ChatCommand::Status,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/history" => match arg.filter(|a| !a.is_empty()) {
            None => ChatCommand::History(DEFAULT_HISTORY_COUNT),
            Some(count) => match count.parse::<usize>() {
                Ok(n) if n > 0 => ChatCommand::History(n),
                _ => ChatCommand::Unknown(format!("/history expects a positive count, got '{count}'")),
            },
        },
        other => ChatCommand::Unknown(format!("Unknown command: {other}")),
    };
    Some(command)
}

/// Write the help text listing all available commands.
pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    let rows = [
        ("/help", "Show this help message"),
        ("/history [n]", "Show the last n messages (default 20)"),
        ("/status", "Show connection and delivery status"),
        ("/clear", "Clear the screen"),
        ("/exit", "Leave the session"),
    ];
    for (name, description) in rows {
        writeln!(out, "  {:<14} {}", style(name).cyan(), description)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Ctrl+D to exit. Messages from others appear as they arrive.").dim()
    )?;
    writeln!(out)
}
