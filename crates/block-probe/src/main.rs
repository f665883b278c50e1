//! Block Probe: print the transaction hashes of every new block on a
//! CometBFT/Tendermint chain.
//!
//! ## Usage
//!
//! ```bash
//! # Public Cosmos Hub endpoint (default)
//! block-probe
//!
//! # A node's own RPC port, no TLS
//! block-probe --addr 15.204.143.232:26657 --scheme ws
//! ```
//!
//! Block reports go to stdout, logs to stderr (`RUST_LOG` controls verbosity).
//! Exit status is zero only after an operator interrupt.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use block_probe::{ProbeConfig, Reporter, Scheme, Session};

/// Subscribe to NewBlock events and print transaction hashes
#[derive(Parser, Debug)]
#[command(name = "block-probe")]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "Exits 0 after Ctrl+C. Exits non-zero when the node closes the stream, \
                  the connection fails, or a frame cannot be decoded."
)]
struct Args {
    /// Node address as host:port [default: cosmoshub.rpc.kjnodes.com:443, env: PROBE_ADDR]
    #[arg(long)]
    addr: Option<String>,

    /// Websocket scheme
    #[arg(long, value_enum, default_value_t = Scheme::Wss)]
    scheme: Scheme,

    /// How long to wait for the node to acknowledge a close, in milliseconds
    /// [default: 1000, env: PROBE_CLOSE_TIMEOUT_MS]
    #[arg(long)]
    close_timeout_ms: Option<u64>,

    /// Print hashes in uppercase hex
    #[arg(long)]
    uppercase: bool,
}

/// Defaults, then environment, then explicit flags.
fn load_config(args: Args) -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.apply_env_overrides();

    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(ms) = args.close_timeout_ms {
        config.close_timeout = Duration::from_millis(ms);
    }
    config.scheme = args.scheme;
    config.uppercase_hashes = args.uppercase;
    config
}

/// Forward the first Ctrl+C to the session.
fn spawn_interrupt_listener() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => error!("failed to listen for interrupt: {}", e),
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = load_config(Args::parse());
    config.validate().context("invalid configuration")?;

    let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
    let reporter = tokio::spawn(Reporter::new(io::stdout(), config.uppercase_hashes).run(event_rx));

    let shutdown = spawn_interrupt_listener();
    let outcome = Session::new(config, event_tx).run(shutdown).await;

    // The session dropped its sender, so the reporter drains and exits.
    match reporter.await.context("reporter task panicked")? {
        Ok(reporter) => info!("reported {} blocks", reporter.blocks_reported()),
        Err(e) => warn!("report output failed: {}", e),
    }

    let outcome = outcome.context("session terminated")?;
    if outcome.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("stream ended without an interrupt ({:?})", outcome);
        Ok(ExitCode::FAILURE)
    }
}
