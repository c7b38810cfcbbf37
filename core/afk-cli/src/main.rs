//! afk: client for the AFK agent.
//!
//! Sends a configured action (or `terminate`) to a running `afk-agent`
//! over its local socket, or prints the agent's current status.

mod agent_client;

use afk_agent_protocol::{socket_path, ActionRequest, Method, Request, TERMINATE};
use afk_core::{default_config_path, load_config, AgentConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "afk")]
#[command(about = "Send an action to the AFK agent")]
#[command(version)]
struct Cli {
    /// Action name from the configuration, or `terminate` to stop the agent
    #[arg(value_name = "ACTION", required_unless_present = "status")]
    action: Option<String>,

    /// Override the status text for this action
    #[arg(long)]
    status_text: Option<String>,

    /// Override the status emoji for this action
    #[arg(long)]
    status_emoji: Option<String>,

    /// Override the away message for this action
    #[arg(long)]
    away_message: Option<String>,

    /// Do not post an away message
    #[arg(long)]
    silent: bool,

    /// Print the agent's current presence and pending status
    #[arg(long, conflicts_with = "action")]
    status: bool,

    /// Configuration file (defaults to ~/.afk.json)
    #[arg(long, env = "AFK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// More verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let request = if cli.status {
        Request::new(Method::GetStatus, None)
    } else {
        let action = cli.action.clone().unwrap_or_default();
        if action != TERMINATE {
            let config = match load_client_config(cli.config.clone()) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("Error: {}", err);
                    return ExitCode::FAILURE;
                }
            };
            if let Err(err) = validate_action(&action, &config) {
                eprintln!("{}", err);
                return ExitCode::FAILURE;
            }
        }
        Request::run_action(&ActionRequest {
            action,
            status_text: cli.status_text,
            status_emoji: cli.status_emoji,
            away_message: cli.away_message,
            silent: cli.silent,
        })
    };

    let socket = socket_path();
    tracing::debug!(socket = %socket.display(), method = ?request.method, "Sending request");
    match agent_client::send_request(&socket, &request) {
        Ok(data) => {
            match serde_json::to_string_pretty(&data) {
                Ok(rendered) => println!("{}", rendered),
                Err(_) => println!("{}", data),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_client_config(path: Option<PathBuf>) -> Result<AgentConfig, String> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    load_config(&path).map_err(String::from)
}

/// Accepts configured action names plus `terminate`.
fn validate_action(action: &str, config: &AgentConfig) -> Result<(), String> {
    if action.trim().is_empty() {
        return Err("No action provided. Action is required when running the client.".to_string());
    }
    if action == TERMINATE || config.find_action(action).is_some() {
        return Ok(());
    }

    let mut valid = config.action_names();
    valid.push(TERMINATE);
    Err(format!(
        "Action \"{}\" is not valid. Valid actions are {}",
        action,
        valid.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use afk_core::ActionEntry;

    fn config() -> AgentConfig {
        AgentConfig {
            actions: vec![
                ActionEntry {
                    action: "lunch".to_string(),
                    ..ActionEntry::default()
                },
                ActionEntry::default(),
                ActionEntry {
                    action: "meeting".to_string(),
                    ..ActionEntry::default()
                },
            ],
            ..AgentConfig::default()
        }
    }

    #[test]
    fn accepts_configured_actions_and_terminate() {
        assert!(validate_action("lunch", &config()).is_ok());
        assert!(validate_action("terminate", &config()).is_ok());
    }

    #[test]
    fn rejects_unknown_action_listing_valid_ones() {
        let err = validate_action("nap", &config()).unwrap_err();
        assert_eq!(
            err,
            "Action \"nap\" is not valid. Valid actions are lunch, meeting, terminate"
        );
    }

    #[test]
    fn rejects_blank_action() {
        assert!(validate_action("", &config()).is_err());
    }

    #[test]
    fn status_flag_needs_no_action() {
        let cli = Cli::try_parse_from(["afk", "--status"]).unwrap();
        assert!(cli.status);
        assert!(cli.action.is_none());
        assert!(Cli::try_parse_from(["afk"]).is_err());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "afk",
            "lunch",
            "--status-text",
            "Eating",
            "--silent",
        ])
        .unwrap();
        assert_eq!(cli.action.as_deref(), Some("lunch"));
        assert_eq!(cli.status_text.as_deref(), Some("Eating"));
        assert!(cli.silent);
    }
}
