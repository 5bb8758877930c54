//! Async line input for the chat loop.
//!
//! `rustyline_async` keeps the prompt pinned to the bottom line while live
//! messages are written above it through the returned `SharedWriter`.

use console::style;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// What the user did at the prompt.
#[derive(Debug)]
pub enum InputEvent {
    /// A non-empty, trimmed line.
    Line(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt (Ctrl+C).
    Interrupted,
}

pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Create the prompt for `username`.
    ///
    /// Returns the input handler and a writer for output that must not
    /// interfere with the line being typed.
    pub fn new(username: &str) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, out) = Readline::new(prompt_for(username))?;
        Ok((Self { rl }, out))
    }

    /// Wait for the next submitted line. Blank lines are swallowed.
    ///
    /// The line being typed lives in the `Readline`, so dropping this
    /// future from a `select!` loses nothing.
    pub async fn read_line(&mut self) -> InputEvent {
        loop {
            match self.rl.readline().await {
                Ok(ReadlineEvent::Line(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.rl.add_history_entry(line.to_string());
                    return InputEvent::Line(line.to_string());
                }
                Ok(ReadlineEvent::Eof) => return InputEvent::Eof,
                Ok(ReadlineEvent::Interrupted) => return InputEvent::Interrupted,
                Err(e) => {
                    tracing::debug!(error = %e, "Readline failed; treating as EOF");
                    return InputEvent::Eof;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Restore the terminal before the process prints anything else.
    pub fn finish(mut self) {
        let _ = self.rl.flush();
    }
}

fn prompt_for(username: &str) -> String {
    format!("  {} ", style(format!("{username} >")).green().bold())
}
