//! Entry point for the vibwatch agent.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vibwatch_agent::link::{spawn_link_watcher, WATCH_EVERY};
use vibwatch_agent::sim::{spawn_simulator, BATCH_EVERY};
use vibwatch_agent::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "vibwatch_agent", version)]
#[command(about = "Vibration telemetry agent serving /ws and /realtime over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Start without the built-in simulator
    #[arg(long)]
    no_sim: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let state = AppState::new();

    let _watcher = spawn_link_watcher(state.clone(), WATCH_EVERY);
    let _sim = if args.no_sim {
        info!("simulator disabled");
        None
    } else {
        Some(spawn_simulator(state.clone(), BATCH_EVERY))
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("vibwatch_agent listening on http://{addr} (ws at /ws)");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
