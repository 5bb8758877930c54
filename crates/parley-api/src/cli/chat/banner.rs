//! Banner printed when a chat session opens.

use console::style;
use parley_types::chat::ChatSession;

pub fn print_welcome_banner(session: &ChatSession, username: &str, history_len: usize) {
    println!();
    println!(
        "  {} {}",
        style("#").cyan().bold(),
        style(&session.title).cyan().bold()
    );
    println!(
        "  {}",
        style(format!(
            "Session {} · signed in as {} · {} earlier message{}",
            session.id,
            username,
            history_len,
            if history_len == 1 { "" } else { "s" }
        ))
        .dim()
    );
    println!();
    println!(
        "  {}",
        style("Type a message and press Enter. /help lists commands.").dim()
    );
    println!();
}
