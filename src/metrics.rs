use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_poll_runs_total", "Clan poll ticks attempted.");
        describe_counter!(
            "tracker_poll_errors_total",
            "Failed poll ticks and per-player fetch failures."
        );
        describe_counter!(
            "tracker_snapshots_inserted_total",
            "Snapshot rows appended by the clan poller."
        );
        describe_counter!(
            "tracker_gapfill_points_total",
            "Snapshot rows synthesized by the gap interpolator."
        );
        describe_counter!(
            "tracker_retention_deleted_snapshots_total",
            "Snapshot rows pruned by the retention sweep."
        );
        describe_counter!(
            "tracker_retention_deleted_war_stats_total",
            "War-stat rows pruned by the retention sweep."
        );
        describe_gauge!(
            "tracker_last_poll_ts",
            "Unix ts of the last successful clan poll."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose a static gauge for the
    /// configured poll cadence.
    pub fn init(poll_interval_secs: u64) -> Self {
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();
        gauge!("tracker_poll_interval_secs").set(poll_interval_secs as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition
    /// format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
