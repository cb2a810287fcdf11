// src/poller.rs
//! Scheduled pollers feeding the store: a clan poller (snapshot per tick)
//! and a member poller (player records + war stats per tick).
//!
//! Both loops are owned by the entrypoint; the tick bodies
//! ([`poll_clan_once`], [`poll_members_once`]) are plain functions so tests
//! invoke them without timers. A failed tick is logged and skipped; the
//! next tick retries. No backoff escalation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use crate::coc::{ClanApi, PlayerDetail};
use crate::store::{NewWarStat, PlayerRecord, PlayerWarStat, Snapshot, SnapshotInput, TrackerStore};

const DAY_SECS: i64 = 86_400;

/// Pause between per-player fetches, to stay friendly with upstream rate
/// limits.
const PLAYER_FETCH_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub clan_tag: String,
    pub poll_interval_secs: u64,
    pub member_poll_interval_secs: u64,
}

/// Fetch the clan and append one snapshot stamped with the current time.
pub async fn poll_clan_once(
    api: &dyn ClanApi,
    store: &TrackerStore,
    clan_tag: &str,
) -> Result<Snapshot> {
    let clan = api.fetch_clan(clan_tag).await.context("fetching clan")?;

    let input = SnapshotInput {
        timestamp: Some(Utc::now().timestamp()),
        clan_tag: Some(clan.tag),
        clan_name: Some(clan.name),
        clan_level: Some(clan.clan_level),
        clan_points: Some(clan.clan_points),
        clan_capital_points: Some(clan.clan_capital_points),
        members: Some(clan.members),
        war_wins: Some(clan.war_wins),
        war_losses: Some(clan.war_losses),
        required_trophies: Some(clan.required_trophies),
    };

    let snapshot = store
        .insert_snapshot(input)
        .await
        .context("inserting snapshot")?;

    counter!("tracker_snapshots_inserted_total").increment(1);
    gauge!("tracker_last_poll_ts").set(snapshot.timestamp as f64);

    Ok(snapshot)
}

/// Counters moved since the last stored war stat. A first sighting counts
/// as movement.
fn counters_moved(prev: Option<&PlayerWarStat>, detail: &PlayerDetail) -> bool {
    match prev {
        None => true,
        Some(p) => {
            detail.donations > p.donations
                || detail.donations_received > p.donations_received
                || detail.attack_wins > p.attack_wins
                || detail.defense_wins > p.defense_wins
                || detail.war_stars > p.war_stars
        }
    }
}

/// Activity score decays 10 points per full day since `last_active`,
/// clamped to 0..=100.
fn activity_score(now: i64, last_active: i64) -> i64 {
    let days_inactive = (now - last_active).max(0) / DAY_SECS;
    (100 - days_inactive * 10).clamp(0, 100)
}

/// Fetch the member list and, per member, upsert the player record and
/// append a war-stat row. A member that fails is skipped; the rest
/// continue. Returns the number of members recorded.
pub async fn poll_members_once(
    api: &dyn ClanApi,
    store: &TrackerStore,
    clan_tag: &str,
) -> Result<usize> {
    let members = api
        .fetch_members(clan_tag)
        .await
        .context("fetching member list")?;

    let mut recorded = 0usize;
    for member in &members {
        let detail = match api.fetch_player(&member.tag).await {
            Ok(d) => d,
            Err(e) => {
                warn!(player = %member.name, "player fetch failed: {e:#}");
                counter!("tracker_poll_errors_total").increment(1);
                continue;
            }
        };

        if let Err(e) = record_member(store, &detail).await {
            warn!(player = %member.name, "recording member failed: {e:#}");
            counter!("tracker_poll_errors_total").increment(1);
            continue;
        }
        recorded += 1;

        tokio::time::sleep(PLAYER_FETCH_PAUSE).await;
    }

    Ok(recorded)
}

async fn record_member(store: &TrackerStore, detail: &PlayerDetail) -> Result<()> {
    let now = Utc::now().timestamp();
    let prev_stat = store.latest_war_stat(&detail.tag).await?;

    let last_active = if counters_moved(prev_stat.as_ref(), detail) {
        now
    } else {
        store
            .player(&detail.tag)
            .await?
            .map(|p| p.last_active)
            .unwrap_or(now)
    };

    store
        .upsert_player(&PlayerRecord {
            player_tag: detail.tag.clone(),
            player_name: detail.name.clone(),
            town_hall_level: detail.town_hall_level,
            clan_role: detail.role.clone(),
            last_active,
            activity_score: activity_score(now, last_active),
        })
        .await?;

    store
        .insert_war_stat(&NewWarStat {
            player_tag: detail.tag.clone(),
            timestamp: now,
            war_stars: detail.war_stars,
            attack_wins: detail.attack_wins,
            defense_wins: detail.defense_wins,
            donations: detail.donations,
            donations_received: detail.donations_received,
        })
        .await?;

    Ok(())
}

/// Clan poller loop; first tick fires immediately.
pub fn spawn_clan_poller(
    api: Arc<dyn ClanApi>,
    store: Arc<TrackerStore>,
    cfg: PollerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            clan = %cfg.clan_tag,
            interval_secs = cfg.poll_interval_secs,
            "clan poller started"
        );
        let mut ticker = interval(Duration::from_secs(cfg.poll_interval_secs));
        loop {
            ticker.tick().await;
            counter!("tracker_poll_runs_total").increment(1);
            match poll_clan_once(api.as_ref(), &store, &cfg.clan_tag).await {
                Ok(snapshot) => info!(
                    clan = %snapshot.clan_name,
                    members = snapshot.members,
                    points = snapshot.clan_points,
                    "snapshot saved"
                ),
                Err(e) => {
                    counter!("tracker_poll_errors_total").increment(1);
                    warn!("clan poll failed: {e:#}");
                }
            }
        }
    })
}

/// Member poller loop; first tick fires immediately.
pub fn spawn_member_poller(
    api: Arc<dyn ClanApi>,
    store: Arc<TrackerStore>,
    cfg: PollerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            clan = %cfg.clan_tag,
            interval_secs = cfg.member_poll_interval_secs,
            "member poller started"
        );
        let mut ticker = interval(Duration::from_secs(cfg.member_poll_interval_secs));
        loop {
            ticker.tick().await;
            match poll_members_once(api.as_ref(), &store, &cfg.clan_tag).await {
                Ok(recorded) => info!(recorded, "member stats updated"),
                Err(e) => {
                    counter!("tracker_poll_errors_total").increment(1);
                    warn!("member poll failed: {e:#}");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_score_decays_and_clamps() {
        let now = 20 * DAY_SECS;
        assert_eq!(activity_score(now, now), 100);
        assert_eq!(activity_score(now, now - 3 * DAY_SECS), 70);
        assert_eq!(activity_score(now, now - 15 * DAY_SECS), 0);
        // clock skew never overshoots
        assert_eq!(activity_score(now, now + DAY_SECS), 100);
    }

    #[test]
    fn first_sighting_counts_as_movement() {
        let detail = PlayerDetail {
            tag: "#P1".into(),
            name: "one".into(),
            town_hall_level: 10,
            role: "member".into(),
            war_stars: 0,
            attack_wins: 0,
            defense_wins: 0,
            donations: 0,
            donations_received: 0,
        };
        assert!(counters_moved(None, &detail));
    }
}
