use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::config::{StoredConfig, config_file_path};
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring ticketdesk.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Access tokens are stored in the local config file; protect it accordingly.");
    println!();

    apply_prompt("Store backend (local/firestore)", &mut cfg.backend, false)?;
    apply_prompt("Local data file path", &mut cfg.local_path, false)?;
    apply_prompt("Firestore project id", &mut cfg.firestore_project, false)?;
    apply_prompt(
        "Firestore database id (default: (default))",
        &mut cfg.firestore_database,
        false,
    )?;
    apply_prompt("Firestore access token", &mut cfg.firestore_token, true)?;
    apply_prompt(
        "Firestore API endpoint (blank for the public API)",
        &mut cfg.firestore_endpoint,
        false,
    )?;
    apply_prompt("Live feed poll interval (seconds)", &mut cfg.poll_seconds, false)?;
    apply_prompt("Your user id", &mut cfg.actor_id, false)?;
    apply_prompt("Your display name", &mut cfg.actor_name, false)?;
    apply_prompt("Closed tickets group name", &mut cfg.closed_group_name, false)?;
    apply_prompt(
        "Claiming a ticket someone else holds (reject/warn/allow)",
        &mut cfg.claim_policy,
        false,
    )?;

    cfg.save()?;

    let path = config_file_path()?;
    println!("\nConfiguration saved to {}", path.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let cfg = StoredConfig::load()?;
    let path = config_file_path()?;

    println!("Configuration file: {}", path.display());
    println!("Store backend: {}", display_value(&cfg.backend));
    println!("Local data file: {}", display_value(&cfg.local_path));
    println!("Firestore project: {}", display_value(&cfg.firestore_project));
    println!("Firestore database: {}", display_value(&cfg.firestore_database));
    println!("Firestore token: {}", mask_secret(&cfg.firestore_token));
    println!("Firestore endpoint: {}", display_value(&cfg.firestore_endpoint));
    println!("Poll interval: {}", display_value(&cfg.poll_seconds));
    println!("User id: {}", display_value(&cfg.actor_id));
    println!("Display name: {}", display_value(&cfg.actor_name));
    println!("Closed group: {}", display_value(&cfg.closed_group_name));
    println!("Claim policy: {}", display_value(&cfg.claim_policy));

    Ok(())
}

fn apply_prompt(field: &str, target: &mut Option<String>, secret: bool) -> AppResult<()> {
    match prompt(field, target.as_deref(), secret)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => *target = Some(value),
    }
    Ok(())
}

fn prompt(field: &str, current: Option<&str>, secret: bool) -> AppResult<PromptAction> {
    let mut stdout = io::stdout();

    match (current, secret) {
        (Some(_), true) => write!(stdout, "{field} [****] (Enter to keep, '-' to clear): ")?,
        (Some(value), false) => {
            write!(stdout, "{field} [{value}] (Enter to keep, '-' to clear): ")?
        }
        (None, _) => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(PromptAction::from_input(&input))
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.len() > 6 => {
            let prefix: String = token.chars().take(3).collect();
            let suffix: String = token
                .chars()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PromptAction {
    Keep,
    Clear,
    Set(String),
}

impl PromptAction {
    fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            PromptAction::Keep
        } else if trimmed == "-" {
            PromptAction::Clear
        } else {
            PromptAction::Set(trimmed.to_string())
        }
    }
}
