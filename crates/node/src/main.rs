//! Spring '83 publishing and relay node.
//!
//! Subcommands:
//! - `serve` — run the relay server (ingress, propagation, reaper)
//! - `generate-key` — mine a key pair with a valid expiry suffix
//! - `post` — sign standard input as a board and publish it to a server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ed25519_dalek::Signer;
use spring83_protocol::timetag::parse_modified;
use spring83_protocol::{Board, MAX_BOARD_BYTES};
use spring83_relay::{PeerClient, PropagationTracker};
use spring83_server::{BoardServer, ServerContext};
use spring83_store::{BoardStore, MemoryStore, Reaper, SledStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod keygen;

use config::{NodeConfig, StoreDriver};

#[derive(Parser, Debug)]
#[command(name = "springboard")]
#[command(about = "Spring '83 publishing and relay node", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server
    Serve {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Mine a key pair whose public key carries a valid expiry suffix
    GenerateKey {
        /// Directory for key.pub / key.priv (default: ~/.config/spring83)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Sign standard input as a board and publish it
    Post {
        /// Base URL of the target server
        server_url: String,
        /// Directory holding key.pub / key.priv (default: ~/.config/spring83)
        #[arg(long)]
        key_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve { config } => serve(config.as_deref()).await,
        Command::GenerateKey { dir } => keygen::generate_and_store(dir),
        Command::Post {
            server_url,
            key_dir,
        } => post(&server_url, key_dir).await,
    }
}

async fn serve(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = NodeConfig::load(config_path)?;
    let fqdn = config.fqdn();

    tracing::info!("starting spring83 node");
    tracing::info!("  port: {}", config.port);
    tracing::info!("  fqdn: {fqdn}");
    tracing::info!("  federates: {:?}", config.federates);
    tracing::info!("  propagate wait: {}s", config.propagate_wait_secs);
    tracing::info!("  store: {:?} at {:?}", config.store.driver, config.store.path);

    let store: Arc<dyn BoardStore> = match config.store.driver {
        StoreDriver::Memory => Arc::new(MemoryStore::new()),
        StoreDriver::Sled => Arc::new(
            SledStore::open(&config.store.path).context("could not open board store")?,
        ),
    };

    let client = PeerClient::new(fqdn).context("could not build peer client")?;
    let tracker = PropagationTracker::new(
        client,
        Duration::from_secs(config.propagate_wait_secs),
    );

    tokio::spawn(Reaper::new(store.clone()).run());

    let context = Arc::new(ServerContext {
        store,
        tracker,
        federates: config.federates.clone(),
        admin_board: config.admin_board.clone(),
    });
    let server = BoardServer::new(context);
    let addr = format!("0.0.0.0:{}", config.port);

    tokio::select! {
        result = server.run(&addr) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

/// Sign stdin as a board and PUT it. The `<time>` tag is backdated a few
/// minutes so picky servers with skewed clocks still accept it.
async fn post(server_url: &str, key_dir: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::Read;

    let (signing_key, public_hex) = keygen::load_keys(key_dir)?;

    let mut text = Vec::new();
    std::io::stdin()
        .read_to_end(&mut text)
        .context("could not read board text from stdin")?;
    if text.is_empty() {
        bail!("input required");
    }

    let stamp = (chrono::Utc::now() - chrono::Duration::minutes(10))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    let mut body = format!("<time datetime=\"{stamp}\"></time>").into_bytes();
    body.extend_from_slice(&text);
    if body.len() > MAX_BOARD_BYTES {
        bail!("input body too long ({} bytes, max {MAX_BOARD_BYTES})", body.len());
    }

    let modified = parse_modified(&body).context("could not parse the generated time tag")?;
    let signature = hex::encode(signing_key.sign(&body).to_bytes());
    let board = Board {
        key: public_hex,
        body,
        modified,
        signature,
    };

    let client = PeerClient::new(String::new()).context("could not build client")?;
    client
        .post_board(server_url, &board)
        .await
        .context("could not post board")?;
    println!("posted board for {}", board.key);
    Ok(())
}
