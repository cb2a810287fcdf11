// src/store/retention.rs
//! Retention sweep: bounds storage growth while guaranteeing a minimum
//! lookback window stays queryable.
//!
//! Two-tier policy: snapshots are only pruned once there is confirmed
//! density of recent data (>= `min_recent_snapshots` rows in the last
//! `recent_window_days`). Sparse history is never destroyed just because it
//! is old. War stats get a longer, unguarded window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::{StoreError, TrackerStore};

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    /// Window used to measure recent polling density.
    pub recent_window_days: i64,
    /// Minimum snapshot count inside the recent window before anything is
    /// deleted.
    pub min_recent_snapshots: i64,
    /// Snapshots older than this are pruned once the density guard passes.
    pub snapshot_max_age_days: i64,
    /// War stats older than this are always pruned.
    pub war_stat_max_age_days: i64,
    /// Sweep cadence.
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            recent_window_days: 7,
            min_recent_snapshots: 1000,
            snapshot_max_age_days: 30,
            war_stat_max_age_days: 90,
            interval_secs: DAY_SECS as u64,
        }
    }
}

/// Result of one sweep, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    pub recent_snapshots: i64,
    pub deleted_snapshots: u64,
    pub deleted_war_stats: u64,
}

/// Run one retention sweep against the store. Callable directly, without
/// the timer, so tests don't wait on wall-clock.
pub async fn run_once(
    store: &TrackerStore,
    cfg: &RetentionConfig,
) -> Result<RetentionOutcome, StoreError> {
    let now = Utc::now().timestamp();
    let recent_cutoff = now - cfg.recent_window_days * DAY_SECS;
    let snapshot_cutoff = now - cfg.snapshot_max_age_days * DAY_SECS;
    let war_stat_cutoff = now - cfg.war_stat_max_age_days * DAY_SECS;

    let recent_snapshots = store.count_snapshots_since(recent_cutoff).await?;

    let deleted_snapshots = if recent_snapshots >= cfg.min_recent_snapshots {
        store.delete_snapshots_before(snapshot_cutoff).await?
    } else {
        debug!(
            recent = recent_snapshots,
            threshold = cfg.min_recent_snapshots,
            "retention: recent density below threshold, keeping old snapshots"
        );
        0
    };

    let deleted_war_stats = store.delete_war_stats_before(war_stat_cutoff).await?;

    Ok(RetentionOutcome {
        recent_snapshots,
        deleted_snapshots,
        deleted_war_stats,
    })
}

/// Scheduled wrapper around [`run_once`]. Owned by the process supervisor;
/// a failed sweep is logged and retried on the next tick.
pub struct RetentionService {
    store: Arc<TrackerStore>,
    cfg: RetentionConfig,
}

impl RetentionService {
    pub fn new(store: Arc<TrackerStore>, cfg: RetentionConfig) -> Self {
        Self { store, cfg }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                max_age_days = self.cfg.snapshot_max_age_days,
                min_recent = self.cfg.min_recent_snapshots,
                war_stat_max_age_days = self.cfg.war_stat_max_age_days,
                "retention sweep scheduled"
            );
            let mut ticker = interval(Duration::from_secs(self.cfg.interval_secs));
            loop {
                ticker.tick().await;
                match run_once(&self.store, &self.cfg).await {
                    Ok(outcome) => {
                        counter!("tracker_retention_deleted_snapshots_total")
                            .increment(outcome.deleted_snapshots);
                        counter!("tracker_retention_deleted_war_stats_total")
                            .increment(outcome.deleted_war_stats);
                        if outcome.deleted_snapshots > 0 || outcome.deleted_war_stats > 0 {
                            info!(
                                deleted_snapshots = outcome.deleted_snapshots,
                                deleted_war_stats = outcome.deleted_war_stats,
                                "retention sweep pruned old rows"
                            );
                        }
                    }
                    Err(e) => warn!("retention sweep failed: {e:#}"),
                }
            }
        })
    }
}
