//! Terminal formatting for chat lines and connection notices.

use console::style;
use parley_core::channel::ChannelNotice;
use parley_types::chat::{DeliveryStatus, Message, MessageOrigin};

/// One chat line: time, author, content, plus a marker for undelivered
/// local messages.
pub fn format_message(message: &Message) -> String {
    let time = style(message.created_at.format("%H:%M")).dim();
    let author = match (message.origin, message.sender_id) {
        (MessageOrigin::Local, _) => style("you".to_string()).green().bold(),
        (MessageOrigin::Remote, Some(id)) => style(format!("user {id}")).cyan().bold(),
        (MessageOrigin::Remote, None) => style("someone".to_string()).cyan(),
    };
    let marker = match message.status {
        DeliveryStatus::Confirmed => String::new(),
        DeliveryStatus::Pending => format!(" {}", style("(sending)").dim()),
        DeliveryStatus::Failed => format!(" {}", style("(not delivered)").red()),
    };
    format!("  {time} {author} {}{marker}", message.content)
}

/// Text for a connection notice, or `None` when it needs no line.
pub fn format_notice(notice: &ChannelNotice) -> Option<String> {
    let line = match notice {
        ChannelNotice::Connected => return None,
        ChannelNotice::Reconnected => {
            format!("  {} Reconnected.", style("✓").green().bold())
        }
        ChannelNotice::Disconnected => format!(
            "  {} Connection lost. Reconnecting...",
            style("!").yellow().bold()
        ),
        ChannelNotice::GaveUp => format!(
            "  {} Could not reconnect. Messages cannot be sent until you restart the chat.",
            style("✗").red().bold()
        ),
    };
    Some(line)
}

pub fn format_error(text: &str) -> String {
    format!("  {} {text}", style("!").red().bold())
}

pub fn format_info(text: &str) -> String {
    format!("  {}", style(text).dim())
}
