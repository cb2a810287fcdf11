//! Clan Tracker — Binary Entrypoint
//! Boots the Axum HTTP server and the scheduled background jobs: clan
//! poller, member poller, retention sweep, gap-fill sweep.

mod api;
mod coc;
mod config;
mod metrics;
mod poller;
mod store;
mod trends;

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::coc::{ClanApi, CocClient};
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::poller::PollerConfig;
use crate::store::{GapFillService, RetentionService, TrackerStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clan_tracker=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the variables come from the
    // real environment.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init(cfg.poll_interval_secs);

    let store = Arc::new(TrackerStore::open(&cfg.database_url).await?);
    let api_client: Arc<dyn ClanApi> = Arc::new(CocClient::new(cfg.coc_api_key.clone()));

    // Scheduled jobs, owned here. Each loop ticks immediately once, so the
    // dashboard has data right after startup.
    let poller_cfg = PollerConfig {
        clan_tag: cfg.clan_tag.clone(),
        poll_interval_secs: cfg.poll_interval_secs,
        member_poll_interval_secs: cfg.member_poll_interval_secs,
    };
    let _jobs = [
        poller::spawn_clan_poller(api_client.clone(), store.clone(), poller_cfg.clone()),
        poller::spawn_member_poller(api_client, store.clone(), poller_cfg),
        RetentionService::new(store.clone(), cfg.retention).spawn(),
        GapFillService::new(store.clone(), cfg.gapfill).spawn(),
    ];

    let state = api::AppState::new(store, cfg.clan_tag);
    let router = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    tracing::info!(port = cfg.port, "clan tracker listening");
    axum::serve(listener, router).await?;

    Ok(())
}
