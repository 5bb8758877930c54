//! Identity commands: signin, signup, logout, whoami.

use anyhow::{Result, bail};
use console::style;
use dialoguer::{Input, Password};
use parley_types::identity::{AuthOutcome, Credentials, Registration, User};

use super::{require_identity, spinner};
use crate::state::AppState;

pub async fn sign_in(
    state: &AppState,
    identifier: Option<String>,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let identifier = match identifier {
        Some(identifier) => identifier,
        None => Input::<String>::new()
            .with_prompt("Email or username")
            .interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let progress = (!json).then(|| spinner("Signing in..."));
    let outcome = state
        .gate
        .sign_in(&Credentials::new(identifier, password))
        .await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    report_outcome(outcome, "Signed in as", json)
}

pub async fn sign_up(
    state: &AppState,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => Input::<String>::new().with_prompt("Username").interact_text()?,
    };
    let email = match email {
        Some(email) => email,
        None => Input::<String>::new().with_prompt("Email").interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?,
    };

    let progress = (!json).then(|| spinner("Creating account..."));
    let outcome = state
        .gate
        .sign_up(&Registration::new(username, email, password))
        .await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    report_outcome(outcome, "Account created. Signed in as", json)
}

fn report_outcome(outcome: AuthOutcome, headline: &str, json: bool) -> Result<()> {
    match outcome {
        AuthOutcome::Success(identity) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"success": true, "user": identity.user})
                );
            } else {
                println!();
                println!(
                    "  {} {headline} {}",
                    style("✓").green().bold(),
                    style(&identity.user.username).cyan().bold()
                );
                println!();
            }
            Ok(())
        }
        AuthOutcome::Failure { message } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"success": false, "error": message})
                );
            }
            bail!(message)
        }
    }
}

pub async fn logout(state: &AppState, json: bool) -> Result<()> {
    state.gate.logout().await;

    if json {
        println!("{}", serde_json::json!({"success": true}));
    } else {
        println!("  {} Signed out.", style("✓").green().bold());
    }
    Ok(())
}

pub async fn whoami(state: &AppState, json: bool) -> Result<()> {
    let identity = require_identity(state).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identity.user)?);
        return Ok(());
    }

    print_user(&identity.user);
    println!(
        "  {} {}",
        style("CMS:").bold(),
        style(state.cms.base_url()).dim()
    );
    println!(
        "  {} {}",
        style("Data:").bold(),
        style(state.data_dir.display()).dim()
    );
    println!();
    Ok(())
}

fn print_user(user: &User) {
    println!();
    println!("  {}", style(&user.username).cyan().bold());
    println!("  {}   {}", style("Id:").bold(), user.id);
    println!("  {} {}", style("Email:").bold(), user.email);
}
