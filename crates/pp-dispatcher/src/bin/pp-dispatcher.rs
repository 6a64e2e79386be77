//! Entry point for the `pp-dispatcher` binary.
//!
//! Connects a ROUTER socket to the broker's worker-facing endpoint,
//! announces `READY`, and runs the poll loop, sending `HEARTBEAT` on
//! the same cadence the broker expects. One thread, one socket, for
//! the life of the process - matching the dispatcher's concurrency
//! model.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pp_config::BalancerConfig;
use pp_dispatcher::{register_bundled, HandlerTable, QueryDispatcher};
use pp_transport::sync_router::connect_router;
use pp_transport::MonotonicClock;

#[derive(Parser, Debug)]
#[command(name = "pp-dispatcher", about = "Query dispatcher for a paranoid-pirate worker")]
struct Cli {
    /// Path to the TOML config file. Defaults to ./balancer.cfg.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "pp_dispatcher=info",
        1 => "pp_dispatcher=debug",
        _ => "pp_dispatcher=trace,pp_proto=trace,pp_transport=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = BalancerConfig::load(cli.config.as_deref())
        .context("failed to load dispatcher configuration")?;
    info!(?config, "starting pp-dispatcher");

    let identity = pp_proto::new_binary_identity();
    info!(identity = %pp_proto::encode_uuid(&identity)?, "worker identity assigned");

    let ctx = zmq::Context::new();
    let socket = connect_router(&ctx, &config.worker, &identity)?;

    let mut handlers = HandlerTable::new();
    register_bundled(&mut handlers);

    let clock = Arc::new(MonotonicClock::new());
    let mut dispatcher = QueryDispatcher::new(handlers, socket, clock)
        .context("failed to announce ready to broker")?;

    // No graceful-drain signal is wired up yet; the stop flag exists so
    // the poll loop's shutdown path (and its tests) don't need runtime
    // support added later to become exercisable.
    let stop = AtomicBool::new(false);
    dispatcher.run(&stop)
}
