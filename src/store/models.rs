// src/store/models.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored clan measurement. `timestamp` is unix seconds. Rows are
/// append-only; timestamps are ordered but not unique (rapid polls may
/// produce duplicate instants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: i64,
    pub clan_tag: String,
    pub clan_name: String,
    pub clan_level: i64,
    pub clan_points: i64,
    pub clan_capital_points: i64,
    pub members: i64,
    pub war_wins: i64,
    pub war_losses: i64,
    pub required_trophies: i64,
}

/// Snapshot as it arrives at the ingestion boundary (camelCase on the wire,
/// every field optional). Normalization happens once, at insert: numerics
/// default to 0, strings to empty. Only a missing `timestamp` is an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotInput {
    pub timestamp: Option<i64>,
    pub clan_tag: Option<String>,
    pub clan_name: Option<String>,
    pub clan_level: Option<i64>,
    pub clan_points: Option<i64>,
    pub clan_capital_points: Option<i64>,
    pub members: Option<i64>,
    pub war_wins: Option<i64>,
    pub war_losses: Option<i64>,
    pub required_trophies: Option<i64>,
}

/// Latest known identity and activity summary for one clan member.
/// At most one row per `player_tag` (upsert semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub player_tag: String,
    pub player_name: String,
    pub town_hall_level: i64,
    pub clan_role: String,
    pub last_active: i64,
    pub activity_score: i64,
}

/// Append-only per-player, per-poll measurement of cumulative counters.
/// The counters come from the upstream API and may reset; consumers must
/// clamp deltas (see `trends`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlayerWarStat {
    pub id: i64,
    pub player_tag: String,
    pub timestamp: i64,
    pub war_stars: i64,
    pub attack_wins: i64,
    pub defense_wins: i64,
    pub donations: i64,
    pub donations_received: i64,
}

/// War-stat row as produced by the member poller, before the store assigns
/// an id.
#[derive(Debug, Clone, Default)]
pub struct NewWarStat {
    pub player_tag: String,
    pub timestamp: i64,
    pub war_stars: i64,
    pub attack_wins: i64,
    pub defense_wins: i64,
    pub donations: i64,
    pub donations_received: i64,
}
