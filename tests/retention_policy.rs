// tests/retention_policy.rs
//
// Two-tier retention: the density guard must protect sparse history, and
// pruning must only touch rows outside the retention window. War stats get
// a longer, unguarded window.

use chrono::Utc;
use clan_tracker::store::{
    retention, NewWarStat, RetentionConfig, SnapshotInput, TrackerStore,
};

const DAY: i64 = 86_400;

async fn open_store() -> (tempfile::TempDir, TrackerStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}/tracker.db", dir.path().display());
    let store = TrackerStore::open(&url).await.expect("open store");
    (dir, store)
}

async fn seed_snapshot(store: &TrackerStore, ts: i64) {
    store
        .insert_snapshot(SnapshotInput {
            timestamp: Some(ts),
            clan_tag: Some("#TEST".into()),
            ..Default::default()
        })
        .await
        .expect("seed snapshot");
}

#[tokio::test]
async fn sparse_recent_data_blocks_all_pruning() {
    let (_dir, store) = open_store().await;
    let now = Utc::now().timestamp();

    // Well below the default 1000-row density threshold, plus rows far
    // older than the 30-day window.
    for i in 0..10 {
        seed_snapshot(&store, now - i * 3600).await;
    }
    for i in 0..5 {
        seed_snapshot(&store, now - (40 + i) * DAY).await;
    }

    let outcome = retention::run_once(&store, &RetentionConfig::default())
        .await
        .expect("sweep");

    assert_eq!(outcome.recent_snapshots, 10);
    assert_eq!(outcome.deleted_snapshots, 0);
    assert_eq!(store.all_snapshots(None).await.expect("all").len(), 15);
}

#[tokio::test]
async fn dense_recent_data_prunes_only_expired_rows() {
    let (_dir, store) = open_store().await;
    let now = Utc::now().timestamp();

    // Lowered threshold keeps the test fast; the policy shape is the same.
    let cfg = RetentionConfig {
        min_recent_snapshots: 5,
        ..RetentionConfig::default()
    };

    for i in 0..6 {
        seed_snapshot(&store, now - i * 3600).await; // recent
    }
    seed_snapshot(&store, now - 10 * DAY).await; // inside 30d, outside 7d
    for i in 0..3 {
        seed_snapshot(&store, now - (40 + i) * DAY).await; // expired
    }

    let outcome = retention::run_once(&store, &cfg).await.expect("sweep");

    assert_eq!(outcome.recent_snapshots, 6);
    assert_eq!(outcome.deleted_snapshots, 3);

    let remaining = store.all_snapshots(None).await.expect("all");
    assert_eq!(remaining.len(), 7);
    // The 10-day-old row is older than the density window but inside the
    // retention window; it must survive.
    assert!(remaining
        .iter()
        .any(|s| (s.timestamp - (now - 10 * DAY)).abs() < 60));
}

#[tokio::test]
async fn threshold_is_inclusive() {
    let (_dir, store) = open_store().await;
    let now = Utc::now().timestamp();

    let cfg = RetentionConfig {
        min_recent_snapshots: 5,
        ..RetentionConfig::default()
    };

    // Exactly at the threshold: pruning runs.
    for i in 0..5 {
        seed_snapshot(&store, now - i * 3600).await;
    }
    seed_snapshot(&store, now - 45 * DAY).await;

    let outcome = retention::run_once(&store, &cfg).await.expect("sweep");
    assert_eq!(outcome.deleted_snapshots, 1);
}

#[tokio::test]
async fn war_stats_purge_is_unguarded_and_uses_longer_window() {
    let (_dir, store) = open_store().await;
    let now = Utc::now().timestamp();

    // Sparse snapshots: the snapshot guard blocks, the war-stat purge
    // still runs.
    seed_snapshot(&store, now - 45 * DAY).await;

    for (ts, donations) in [(now - 100 * DAY, 10), (now - 50 * DAY, 20), (now, 30)] {
        store
            .insert_war_stat(&NewWarStat {
                player_tag: "#P1".into(),
                timestamp: ts,
                donations,
                ..Default::default()
            })
            .await
            .expect("seed stat");
    }

    let outcome = retention::run_once(&store, &RetentionConfig::default())
        .await
        .expect("sweep");

    assert_eq!(outcome.deleted_snapshots, 0);
    assert_eq!(outcome.deleted_war_stats, 1);

    let stats = store.war_stats_for("#P1", 0).await.expect("stats");
    assert_eq!(stats.len(), 2);
    assert!(stats.iter().all(|s| s.timestamp >= now - 90 * DAY));
}
