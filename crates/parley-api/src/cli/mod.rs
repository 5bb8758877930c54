//! CLI command definitions and dispatch for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Commands map onto the
//! identity gate (`signin`, `signup`, `logout`, `whoami`), the session
//! store (`sessions`, `history`), the live chat loop (`chat`) and the HTTP
//! gateway (`serve`).

pub mod auth;
pub mod chat;
pub mod session;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use indicatif::{ProgressBar, ProgressStyle};
use parley_types::identity::Identity;

use crate::state::AppState;

/// Chat with other users through a headless CMS.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "PARLEY_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with an email or username.
    #[command(alias = "login")]
    Signin {
        /// Email or username. Prompted for when omitted.
        #[arg(long, short)]
        identifier: Option<String>,

        /// Password. Prompted for (hidden) when omitted.
        #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Register a new account and sign in.
    #[command(alias = "register")]
    Signup {
        #[arg(long, short)]
        username: Option<String>,

        #[arg(long, short)]
        email: Option<String>,

        #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Manage chat sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Print the message history of a chat session.
    History {
        /// Numeric id of the chat session.
        session_id: u64,
    },

    /// Open a chat session and exchange messages live.
    Chat {
        /// Numeric id of the chat session.
        session_id: u64,
    },

    /// Start the HTTP auth gateway.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List your chat sessions.
    #[command(alias = "ls")]
    List,

    /// Create a chat session.
    Create {
        /// Title of the new session.
        title: String,
    },

    /// Delete a chat session.
    #[command(alias = "rm")]
    Delete {
        /// Numeric id or document id of the chat session.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}

/// Restore the stored identity or fail with a hint to sign in.
pub async fn require_identity(state: &AppState) -> Result<Identity> {
    state
        .gate
        .restore_session()
        .await
        .ok_or_else(|| anyhow::anyhow!("Not signed in. Run: parley signin"))
}

/// Steady-ticking spinner for a single pending request.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
