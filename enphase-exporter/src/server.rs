use std::{future::pending, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    core::{
        poller::{Poller, TriggerMode},
        snapshot::Telemetry,
    },
    metrics::{CONTENT_TYPE, Metrics},
    prelude::*,
};

pub struct AppState {
    poller: Arc<Poller>,
    published: watch::Receiver<Arc<Telemetry>>,
    metrics: Metrics,
    mode: TriggerMode,

    /// How long a scrape waits for another scrape's cycle before serving the latest telemetry.
    cycle_wait: Duration,
}

impl AppState {
    pub fn new(
        poller: Arc<Poller>,
        metrics: Metrics,
        mode: TriggerMode,
        cycle_wait: Duration,
    ) -> Self {
        Self { published: poller.subscribe(), poller, metrics, mode, cycle_wait }
    }
}

/// Longest a `/metrics` request may take: one wait for the cycle lock, plus one fetch, plus a margin.
#[must_use]
pub fn request_timeout(fetch_timeout: Duration) -> Duration {
    fetch_timeout * 2 + Duration::from_secs(5)
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/metrics", get(get_metrics))
        .with_state(Arc::new(state))
        .layer((TraceLayer::new_for_http(), TimeoutLayer::new(request_timeout)))
}

async fn get_index() -> &'static str {
    "Enphase Envoy exporter, see /metrics\n"
}

#[instrument(skip_all)]
async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    let telemetry = match state.mode {
        TriggerMode::Timer => Arc::clone(&state.published.borrow()),
        TriggerMode::Scrape => state.poller.refresh_within(state.cycle_wait).await,
    };
    match state.metrics.render(&telemetry) {
        Ok(rendered) => Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], rendered)),
        Err(error) => {
            error!("failed to render the metrics: {error:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Resolves on Ctrl+C, or on SIGTERM on Unix.
///
/// A signal that cannot be listened for is logged and never fires.
pub async fn shutdown_signal() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupted"),
            Err(error) => {
                error!("failed to listen for Ctrl+C: {error:#}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signals) => {
                signals.recv().await;
                info!("terminated");
            }
            Err(error) => {
                error!("failed to listen for SIGTERM: {error:#}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}
