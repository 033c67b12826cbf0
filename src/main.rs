//! Filings Feed, binary entrypoint.
//! Boots the ingestion orchestrator, refresh scheduler, push-event loop, and
//! the Axum consumer API.

use std::sync::Arc;

use filings_feed::api::{self, AppState};
use filings_feed::config::FeedConfig;
use filings_feed::ingest::fallback::PlaceholderData;
use filings_feed::ingest::providers::http_api::HttpAnnouncementApi;
use filings_feed::metrics::Metrics;
use filings_feed::orchestrator::Orchestrator;
use filings_feed::store::FileKv;
use filings_feed::stream::ChannelTransport;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filings_feed=info,feed=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = FeedConfig::load();
    filings_feed::ingest::ensure_metrics_described();
    let metrics = Metrics::init(cfg.refresh_interval_secs);

    let bulk = Arc::new(HttpAnnouncementApi::from_base_url(
        cfg.api_base_url.clone(),
        cfg.bulk_timeout_secs,
    ));
    // In-process transport: the dashboard's socket client plugs in through
    // the same trait when one is wired up.
    let transport = Arc::new(ChannelTransport::new());
    let store = Arc::new(FileKv::open(cfg.state_path.clone()));
    let listen_addr = cfg.listen_addr.clone();

    let orchestrator = Arc::new(Orchestrator::new(
        bulk,
        transport,
        store.clone(),
        Arc::new(PlaceholderData),
        cfg,
    ));

    // Initial load, then steady-state: scheduler + push loop.
    let first = orchestrator.refresh(None, None, None).await;
    tracing::info!(total = first.total, fallback = first.fallback_used, "initial feed load");

    let _scheduler = orchestrator.spawn_refresh_scheduler();
    let _events = orchestrator.spawn_event_loop();

    let state = AppState {
        orchestrator,
        store,
    };
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(%listen_addr, "consumer api listening");
    axum::serve(listener, router).await?;

    Ok(())
}
