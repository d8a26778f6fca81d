#![allow(clippy::doc_markdown)]
#![doc = include_str!("../../README.md")]

mod api;
mod cli;
mod core;
mod errors;
mod metrics;
mod prelude;
mod server;

use std::sync::Arc;

use clap::{Parser, crate_version};
use tokio::net::TcpListener;

use crate::{
    api::envoy,
    cli::Args,
    core::poller::{Poller, TriggerMode},
    metrics::Metrics,
    prelude::*,
    server::{AppState, request_timeout, router, shutdown_signal},
};

#[tokio::main]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    let args = Args::parse();
    info!(
        version = crate_version!(),
        address = %args.enphase_address,
        port = args.port,
        mode = %args.mode,
        "starting…",
    );

    let (poller, metrics) = assemble(&args)?;
    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind to port {}", args.port))?;

    let poller = Arc::new(poller);
    let timer = match args.mode {
        TriggerMode::Timer => {
            info!(polling_interval = ?args.polling_interval(), "polling in the background");
            Some(tokio::spawn(Arc::clone(&poller).run(args.polling_interval())))
        }
        TriggerMode::Scrape => {
            info!("polling on every scrape");
            None
        }
    };

    let state = AppState::new(poller, metrics, args.mode, args.fetch_timeout());
    let app = router(state, request_timeout(args.fetch_timeout()));

    info!("serving…");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(timer) = timer {
        timer.abort();
    }
    info!("done!");
    Ok(())
}

/// Everything fallible at startup that does not touch the network.
fn assemble(args: &Args) -> Result<(Poller, Metrics)> {
    let time_zones = args.time_zones().context("failed to resolve the time zones")?;
    info!(time_zones = ?time_zones.ids().collect::<Vec<_>>(), "resolved the time zones");
    let client = envoy::Client::new(&args.enphase_address, args.fetch_timeout())
        .context("failed to set up the Envoy client")?;
    let metrics =
        Metrics::new(&args.metrics.options()).context("failed to register the metrics")?;
    Ok((Poller::new(client, time_zones), metrics))
}
