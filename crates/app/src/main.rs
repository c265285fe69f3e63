//! Nightcap - shared drink tally with a leader-only dice roll
//!
//! `nightcap host` keeps the session store and serves it to other clients;
//! `nightcap connect` joins a host. Both then run the same console.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nightcap_core::{IdentityCache, Result, SessionMirror, Storage, Tracker};
use nightcap_net::{Client, ConnectionState, Hub, Server, Subscription};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod console;
mod feed;
mod state;
mod ticker;

use config::Config;
use state::AppState;

#[derive(Parser)]
#[command(name = "nightcap")]
#[command(about = "Shared drink tally with a leader-only dice roll", long_about = None)]
struct Cli {
    /// Config file (default: nightcap.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host the session store and use it locally
    Host {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Connect to a host (host:port)
    Connect { addr: String },
}

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Networking, the feed listener and the ticker run here; the console
    // stays on the main thread so repository calls may block
    let runtime = Runtime::new().expect("Failed to create tokio runtime");

    let result = match cli.command {
        Commands::Host { port, database } => host(&runtime, &config, port, database),
        Commands::Connect { addr } => connect(&runtime, &config, &addr),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn host(
    runtime: &Runtime,
    config: &Config,
    port: Option<u16>,
    database: Option<PathBuf>,
) -> Result<()> {
    let db_path = match database {
        Some(path) => path,
        None => config.database_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let hub = Arc::new(Hub::open(&db_path)?);
    let addr = config.bind_addr(port)?;
    let server = runtime.block_on(Server::start(addr, hub.clone()))?;
    tracing::info!(addr = %server.addr(), db = %db_path.display(), "Hosting");
    println!("Hosting on {}", server.addr());

    let feed = hub.subscribe();
    let result = run_client(runtime, config, hub, feed);
    server.shutdown();
    result
}

fn connect(runtime: &Runtime, config: &Config, addr: &str) -> Result<()> {
    let client = runtime.block_on(Client::connect(addr))?;
    let feed = runtime.block_on(client.subscribe())?;
    let repo = client.repository(config.request_timeout());

    let result = run_client(runtime, config, repo, feed);
    if runtime.block_on(client.connection_state()) == ConnectionState::Disconnected {
        tracing::warn!(addr = %addr, "Connection to host was lost during the session");
    }
    runtime.block_on(client.disconnect());
    result
}

/// Load the current session, start the background tasks and hand the
/// terminal to the console
fn run_client<R: Storage>(
    runtime: &Runtime,
    config: &Config,
    repo: R,
    feed: Subscription,
) -> Result<()> {
    let mirror = SessionMirror::new();
    let tracker = Tracker::new(repo, mirror.clone());
    tracker.load()?;

    let (shutdown_tx, _) = broadcast::channel(1);
    runtime.spawn(feed::follow(feed, mirror.clone(), shutdown_tx.subscribe()));
    let (cooldown, _ticker) = ticker::spawn(runtime.handle(), mirror, shutdown_tx.subscribe());

    let mut app = AppState::new(tracker, IdentityCache::new()?, cooldown, config);
    app.restore_identity();

    let stdin = std::io::stdin();
    let result = console::run(&mut app, stdin.lock(), std::io::stdout());

    let _ = shutdown_tx.send(());
    result.map_err(Into::into)
}
