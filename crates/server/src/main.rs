//! World server binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use openclaw_server::{app, run_tick_loop, Gateway};
use openclaw_world::WorldConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative world server", long_about = None)]
struct Args {
    /// Listen address; a bare `:port` binds every interface
    #[arg(long, default_value = ":8787")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr = normalize_addr(&args.addr);

    let gateway = Arc::new(Gateway::new(WorldConfig::default()));
    tokio::spawn(run_tick_loop(gateway.clone()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "world server listening");
    axum::serve(listener, app(gateway))
        .await
        .context("server terminated")?;
    Ok(())
}

fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}
