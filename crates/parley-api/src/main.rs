//! Parley CLI and auth gateway entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, wires the CMS client, credential store and
//! real-time channel, then dispatches to the command handler or starts
//! the HTTP gateway.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SessionCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley_core=debug,parley_infra=debug,parley_api=debug",
        _ => "trace",
    };
    parley_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let result = run(cli, &state).await;

    state.channel.shutdown().await;
    parley_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli, state: &AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Signin {
            identifier,
            password,
        } => cli::auth::sign_in(state, identifier, password, cli.json).await,

        Commands::Signup {
            username,
            email,
            password,
        } => cli::auth::sign_up(state, username, email, password, cli.json).await,

        Commands::Logout => cli::auth::logout(state, cli.json).await,

        Commands::Whoami => cli::auth::whoami(state, cli.json).await,

        Commands::Sessions { action } => match action {
            SessionCommand::List => cli::session::list_sessions(state, cli.json).await,
            SessionCommand::Create { title } => {
                cli::session::create_session(state, &title, cli.json).await
            }
            SessionCommand::Delete { id, force } => {
                cli::session::delete_session(state, &id, force, cli.json).await
            }
        },

        Commands::History { session_id } => {
            cli::session::show_history(state, session_id, cli.json).await
        }

        Commands::Chat { session_id } => {
            cli::chat::loop_runner::run_chat_loop(state, session_id).await
        }

        Commands::Serve { port, host } => serve(state, &host, port).await,

        Commands::Completions { .. } => unreachable!("handled above"),
    }
}

async fn serve(state: &AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Parley gateway listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} {}",
        console::style("CMS:").dim(),
        console::style(state.cms.base_url()).dim()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Gateway stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
