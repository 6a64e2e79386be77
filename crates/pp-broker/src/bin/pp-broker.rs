//! Entry point for the `pp-broker` binary.
//!
//! Binds the client-facing frontend and worker-facing backend router
//! sockets, then runs a single-task event loop: whichever of
//! {backend readable, frontend readable (only polled while workers are
//! available), heartbeat tick} is ready first gets handled, one message
//! at a time, with no locking - the whole broker state lives in this
//! one task.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pp_config::BalancerConfig;
use pp_transport::async_router::{bind_router, ZmqContext};
use pp_transport::MonotonicClock;

#[derive(Parser, Debug)]
#[command(name = "pp-broker", about = "Paranoid-pirate load-balancing broker")]
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
        0 => "pp_broker=info",
        1 => "pp_broker=debug",
        _ => "pp_broker=trace,pp_proto=trace,pp_transport=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = BalancerConfig::load(cli.config.as_deref())
        .context("failed to load broker configuration")?;
    info!(?config, "starting pp-broker");

    let ctx = ZmqContext::new();
    let frontend = bind_router(&ctx, &config.frontend, "frontend")?;
    let backend = bind_router(&ctx, &config.backend, "backend")?;

    let clock = Arc::new(MonotonicClock::new());
    pp_broker::run(frontend, backend, clock).await
}
