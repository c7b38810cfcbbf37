//! AFK agent entrypoint.
//!
//! Mirrors screen lock/unlock to the user's Slack presence and serves action
//! requests from the `afk` client. Two execution contexts feed the single
//! transition engine: the event bridge thread and the command server loop on
//! the main thread.

use afk_core::{
    default_config_path, ensure_config, platform_source, AfkError, ConfigInit, ConfigStore,
    EventBridge, Shutdown, SlackClient, TransitionEngine,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

mod logging;
mod server;

use server::CommandServer;

#[derive(Parser)]
#[command(name = "afk-agent")]
#[command(about = "Mirror screen lock/unlock to your Slack status")]
#[command(version)]
struct Cli {
    /// More verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to ~/.afk.json)
    #[arg(long, env = "AFK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write daily-rolling logs into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Serve IPC requests only; do not watch the screen lock state
    #[arg(long, env = "AFK_NO_LOCK_WATCH")]
    no_lock_watch: bool,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.verbose, cli.log_dir.as_deref());
    info!("AFK agent starting");

    let config_path = match cli.config {
        Some(path) => path,
        None => match default_config_path() {
            Ok(path) => path,
            Err(err) => {
                error!(error = %err, "Failed to resolve configuration path");
                std::process::exit(1);
            }
        },
    };

    match ensure_config(&config_path) {
        Ok(ConfigInit::Created) => {
            error!(
                path = %config_path.display(),
                "Configuration file created; fill the \"token\" setting and start again \
                 (needs the users.profile:write scope, plus chat:write and reactions:write \
                 to post in a channel)"
            );
            std::process::exit(1);
        }
        Ok(ConfigInit::Upgraded { .. }) | Ok(ConfigInit::Current) => {}
        Err(err) => {
            error!(error = %err, "Failed to prepare configuration");
            std::process::exit(1);
        }
    }

    let store = match ConfigStore::load(&config_path) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let config = store.snapshot();
    if !config.has_token() {
        error!(error = %AfkError::MissingToken(config_path.clone()), "Missing Slack token");
        std::process::exit(1);
    }

    let slack = match SlackClient::new(config.token.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "Failed to initialize Slack client");
            std::process::exit(1);
        }
    };
    info!(
        path = %config_path.display(),
        reload = ?store.policy(),
        channel = ?config.channel(),
        actions = config.actions.len(),
        "Configuration loaded"
    );

    let engine = Arc::new(TransitionEngine::new(Arc::new(store), Arc::new(slack)));

    let socket_path = afk_agent_protocol::socket_path();
    let server = match CommandServer::bind(&socket_path) {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to start command server");
            std::process::exit(1);
        }
    };

    let shutdown = Shutdown::new();
    let bridge = if cli.no_lock_watch {
        info!("Screen lock watching disabled");
        None
    } else {
        spawn_event_bridge(Arc::clone(&engine), shutdown.clone())
    };

    info!(path = %socket_path.display(), "AFK agent started");
    server.run(&engine, &shutdown);

    shutdown.request();
    if let Some(handle) = bridge {
        if handle.join().is_err() {
            warn!("Event bridge thread panicked");
        }
    }
    drop(server);
    info!("Exiting");
}

fn spawn_event_bridge(engine: Arc<TransitionEngine>, shutdown: Shutdown) -> Option<JoinHandle<()>> {
    let Some(source) = platform_source() else {
        warn!("Screen lock events are not supported on this platform; serving IPC only");
        return None;
    };

    let spawned = thread::Builder::new()
        .name("event-bridge".to_string())
        .spawn(move || EventBridge::new(source).run(engine.as_ref(), &shutdown));
    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "Failed to spawn event bridge thread");
            None
        }
    }
}
