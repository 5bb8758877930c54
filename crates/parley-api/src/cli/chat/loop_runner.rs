//! Main chat loop orchestration.
//!
//! Resolves the session, brings the channel up, activates the session in a
//! synchronizer (join room, load history), then multiplexes typed input,
//! live room events, connection notices and the pending-echo timer until
//! the user leaves.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use parley_core::channel::ChannelEvent;
use parley_core::sync::{SessionSynchronizer, SyncUpdate};

use crate::cli::{require_identity, spinner};
use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::{format_error, format_info, format_message, format_notice};

/// How long to wait for the first connection before opening the prompt.
const CONNECT_WAIT: Duration = Duration::from_secs(5);

/// Interval of the pending-echo expiry check.
const EXPIRY_TICK: Duration = Duration::from_secs(1);

type ConcreteSynchronizer =
    SessionSynchronizer<parley_infra::cms::CmsClient, parley_infra::socket::WebSocketTransport>;

/// Run the interactive chat loop for one session.
pub async fn run_chat_loop(state: &AppState, session_id: u64) -> anyhow::Result<()> {
    let identity = require_identity(state).await?;
    let session = state
        .session_service
        .find_session(session_id, &identity)
        .await
        .map_err(|e| anyhow!(e.user_message()))?
        .with_context(|| format!("Chat session {session_id} not found"))?;

    state
        .gate
        .connect_channel()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    wait_for_connection(state).await;

    let mut sync: ConcreteSynchronizer =
        SessionSynchronizer::new(Arc::new(state.cms.clone()), Arc::clone(&state.channel));
    let progress = spinner("Loading history...");
    let activated = sync.activate(session.id, &identity).await;
    progress.finish_and_clear();
    activated.map_err(|e| anyhow!(e.user_message()))?;

    print_welcome_banner(&session, &identity.user.username, sync.messages().len());
    for message in sync.messages() {
        println!("{}", format_message(message));
    }
    info!(session_id = session.id, "Chat loop started");

    let (mut input, mut out) = ChatInput::new(&identity.user.username)
        .map_err(|e| anyhow!("Failed to initialize input: {e}"))?;
    let mut notices = state.channel.notices();
    let mut notices_open = true;
    let echo_timeout = Duration::from_secs(state.config.pending_echo_timeout_secs);
    let mut expiry = tokio::time::interval(EXPIRY_TICK);
    expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = input.read_line() => match event {
                InputEvent::Eof => break,
                InputEvent::Interrupted => {
                    writeln!(out, "{}", format_info("Press Ctrl+D or type /exit to leave."))?;
                }
                InputEvent::Line(text) => {
                    if let Some(command) = commands::parse(&text) {
                        if !run_command(command, state, &sync, &mut input, &mut out)? {
                            break;
                        }
                        continue;
                    }
                    if let Err(e) = sync.send(&text).await {
                        writeln!(out, "{}", format_error(&format!("Not sent: {}", e.user_message())))?;
                    }
                }
            },

            event = sync.next_event() => {
                let Some(event) = event else {
                    writeln!(out, "{}", format_error("The real-time channel closed."))?;
                    break;
                };
                let incoming = match &event {
                    ChannelEvent::Message(message) => Some(message.clone()),
                    _ => None,
                };
                match sync.handle(event).await {
                    SyncUpdate::Inserted => {
                        if let Some(message) = incoming {
                            let message = message.into_message(identity.user_id());
                            writeln!(out, "{}", format_message(&message))?;
                        }
                    }
                    SyncUpdate::Resynced(added) if added > 0 => {
                        writeln!(
                            out,
                            "{}",
                            format_info(&format!(
                                "Recovered {added} message(s) sent while offline. /history shows them."
                            ))
                        )?;
                    }
                    SyncUpdate::Confirmed | SyncUpdate::Resynced(_) | SyncUpdate::Ignored => {}
                }
            },

            notice = notices.recv(), if notices_open => match notice {
                Ok(notice) => {
                    if let Some(line) = format_notice(&notice) {
                        writeln!(out, "{line}")?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed connection notices"),
                Err(RecvError::Closed) => notices_open = false,
            },

            _ = expiry.tick() => {
                let expired = sync.expire_pending(echo_timeout);
                if expired > 0 {
                    writeln!(
                        out,
                        "{}",
                        format_error(&format!("{expired} message(s) were not confirmed and may not have been delivered."))
                    )?;
                }
            },
        }
    }

    sync.deactivate().await;
    input.finish();
    println!("\n  {}", style("Left the session.").dim());
    info!(session_id = session.id, "Chat loop ended");
    Ok(())
}

/// Execute a slash command. Returns `false` when the loop should end.
fn run_command(
    command: ChatCommand,
    state: &AppState,
    sync: &ConcreteSynchronizer,
    input: &mut ChatInput,
    out: &mut SharedWriter,
) -> anyhow::Result<bool> {
    match command {
        ChatCommand::Help => commands::print_help(out)?,
        ChatCommand::Clear => input.clear(),
        ChatCommand::Exit => return Ok(false),
        ChatCommand::History(count) => {
            let messages = sync.messages();
            let skip = messages.len().saturating_sub(count);
            writeln!(out)?;
            if messages.is_empty() {
                writeln!(out, "{}", format_info("No messages yet."))?;
            }
            for message in &messages[skip..] {
                writeln!(out, "{}", format_message(message))?;
            }
            writeln!(out)?;
        }
        ChatCommand::Status => {
            let rooms = state
                .channel
                .joined_rooms()
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out)?;
            writeln!(
                out,
                "  {} {}",
                style("Connection:").bold(),
                state.channel.current_state()
            )?;
            if let Some(id) = sync.active_session_id() {
                writeln!(out, "  {}    {id}", style("Session:").bold())?;
            }
            writeln!(out, "  {}      {rooms}", style("Rooms:").bold())?;
            writeln!(out, "  {}    {}", style("Pending:").bold(), sync.pending_count())?;
            writeln!(out)?;
        }
        ChatCommand::Unknown(text) => {
            writeln!(
                out,
                "{}",
                format_error(&format!("{text}. Type /help for available commands."))
            )?;
        }
    }
    Ok(true)
}

async fn wait_for_connection(state: &AppState) {
    let progress = spinner("Connecting...");
    let mut connection = state.channel.state();
    let connected = matches!(
        tokio::time::timeout(CONNECT_WAIT, connection.wait_for(|s| s.is_connected())).await,
        Ok(Ok(_))
    );
    progress.finish_and_clear();
    if !connected {
        println!(
            "  {} {}",
            style("!").yellow().bold(),
            style("Still connecting. Messages sent before the connection is up will fail.").dim()
        );
    }
}
