//! Chat session commands: list, create, delete, history.
//!
//! Lists render as comfy-table tables; deletion asks for confirmation
//! unless `--force` is given.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use parley_types::chat::{ChatSession, Message, MessageOrigin};

use super::{require_identity, spinner};
use crate::state::AppState;

/// List the signed-in user's chat sessions.
///
/// # Examples
///
/// ```bash
/// parley sessions list
/// parley sessions ls --json
/// ```
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let identity = require_identity(state).await?;
    let sessions = state
        .session_service
        .list_sessions(&identity)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No chat sessions yet. Create one with: {}",
            style("i").blue().bold(),
            style("parley sessions create <title>").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", session_table(&sessions));
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

fn session_table(sessions: &[ChatSession]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for session in sessions {
        table.add_row(vec![
            Cell::new(session.id).fg(Color::DarkGrey),
            Cell::new(truncate(&session.title, 40)).fg(Color::Cyan),
            Cell::new(session.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::White),
        ]);
    }
    table
}

pub async fn create_session(state: &AppState, title: &str, json: bool) -> Result<()> {
    let identity = require_identity(state).await?;

    let progress = (!json).then(|| spinner("Creating session..."));
    let result = state.session_service.create_session(title, &identity).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let session = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!();
        println!(
            "  {} Created '{}' (id {})",
            style("✓").green().bold(),
            style(&session.title).cyan(),
            session.id
        );
        println!(
            "  Start chatting: {}",
            style(format!("parley chat {}", session.id)).yellow()
        );
        println!();
    }
    Ok(())
}

pub async fn delete_session(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let identity = require_identity(state).await?;

    // Only the confirmation prompt needs the title.
    let mut key = id.to_string();
    if !force && !json {
        let session = state
            .session_service
            .list_sessions(&identity)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?
            .into_iter()
            .find(|s| s.matches_key(id))
            .with_context(|| format!("Chat session {id} not found"))?;
        key = session.delete_key();

        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete chat session '{}'?",
                style(&session.title).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state
        .session_service
        .delete_session(&key, &identity)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "id": id}));
    } else {
        println!(
            "  {} Chat session {} deleted.",
            style("✓").red().bold(),
            style(id).bold()
        );
    }
    Ok(())
}

/// Print a session's messages, oldest first.
pub async fn show_history(state: &AppState, session_id: u64, json: bool) -> Result<()> {
    let identity = require_identity(state).await?;
    let messages = state
        .session_service
        .history(session_id, &identity)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!();
    if messages.is_empty() {
        println!("  {}", style("No messages yet.").dim());
    }
    for message in &messages {
        println!("  {}", history_line(message));
    }
    println!();
    Ok(())
}

fn history_line(message: &Message) -> String {
    let author = match (message.origin, message.sender_id) {
        (MessageOrigin::Local, _) => style("you".to_string()).green().bold(),
        (MessageOrigin::Remote, Some(id)) => style(format!("user {id}")).cyan().bold(),
        (MessageOrigin::Remote, None) => style("unknown".to_string()).dim(),
    };
    format!(
        "{} {} {}",
        style(message.created_at.format("%Y-%m-%d %H:%M")).dim(),
        author,
        message.content
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
