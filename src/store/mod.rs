//! SQLite-backed time-series store for clan snapshots, player records and
//! per-player war stats.
//!
//! One shared database file, single process. Every operation is a single
//! statement; the sweeps in [`retention`] and [`gapfill`] recompute their
//! view from a fresh read each run, so interleaving with inserts is safe.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub mod gapfill;
pub mod models;
pub mod retention;

pub use gapfill::{fill_gaps_once, GapFillConfig, GapFillService};
pub use models::{NewWarStat, PlayerRecord, PlayerWarStat, Snapshot, SnapshotInput};
pub use retention::{RetentionConfig, RetentionOutcome, RetentionService};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("snapshot missing required field `{0}`")]
    MissingField(&'static str),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS clan_snapshots (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp           INTEGER NOT NULL,
    clan_tag            TEXT NOT NULL DEFAULT '',
    clan_name           TEXT NOT NULL DEFAULT '',
    clan_level          INTEGER NOT NULL DEFAULT 0,
    clan_points         INTEGER NOT NULL DEFAULT 0,
    clan_capital_points INTEGER NOT NULL DEFAULT 0,
    members             INTEGER NOT NULL DEFAULT 0,
    war_wins            INTEGER NOT NULL DEFAULT 0,
    war_losses          INTEGER NOT NULL DEFAULT 0,
    required_trophies   INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_clan_snapshots_ts ON clan_snapshots(timestamp);

CREATE TABLE IF NOT EXISTS players (
    player_tag      TEXT PRIMARY KEY,
    player_name     TEXT NOT NULL DEFAULT '',
    town_hall_level INTEGER NOT NULL DEFAULT 0,
    clan_role       TEXT NOT NULL DEFAULT '',
    last_active     INTEGER NOT NULL DEFAULT 0,
    activity_score  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS player_war_stats (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    player_tag         TEXT NOT NULL,
    timestamp          INTEGER NOT NULL,
    war_stars          INTEGER NOT NULL DEFAULT 0,
    attack_wins        INTEGER NOT NULL DEFAULT 0,
    defense_wins       INTEGER NOT NULL DEFAULT 0,
    donations          INTEGER NOT NULL DEFAULT 0,
    donations_received INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_player_war_stats_tag_ts
    ON player_war_stats(player_tag, timestamp);
"#;

/// Handle to the embedded database. Cheap to clone; all clones share the
/// same pool.
#[derive(Debug, Clone)]
pub struct TrackerStore {
    pool: SqlitePool,
}

impl TrackerStore {
    /// Open (and create if missing) the database at `database_url`
    /// (e.g. `sqlite:data/clan_tracker.db`) and apply the schema.
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let db_path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Connection(format!("creating data directory: {e}"))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Connection(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        tracing::info!(url = database_url, "tracker store opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append one snapshot row. Missing optional numerics become 0, missing
    /// strings become empty; only an absent `timestamp` is rejected.
    pub async fn insert_snapshot(&self, input: SnapshotInput) -> Result<Snapshot, StoreError> {
        let timestamp = input
            .timestamp
            .ok_or(StoreError::MissingField("timestamp"))?;

        let clan_tag = input.clan_tag.unwrap_or_default();
        let clan_name = input.clan_name.unwrap_or_default();
        let clan_level = input.clan_level.unwrap_or(0);
        let clan_points = input.clan_points.unwrap_or(0);
        let clan_capital_points = input.clan_capital_points.unwrap_or(0);
        let members = input.members.unwrap_or(0);
        let war_wins = input.war_wins.unwrap_or(0);
        let war_losses = input.war_losses.unwrap_or(0);
        let required_trophies = input.required_trophies.unwrap_or(0);

        let result = sqlx::query(
            r#"
            INSERT INTO clan_snapshots
                (timestamp, clan_tag, clan_name, clan_level, clan_points,
                 clan_capital_points, members, war_wins, war_losses, required_trophies)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp)
        .bind(&clan_tag)
        .bind(&clan_name)
        .bind(clan_level)
        .bind(clan_points)
        .bind(clan_capital_points)
        .bind(members)
        .bind(war_wins)
        .bind(war_losses)
        .bind(required_trophies)
        .execute(&self.pool)
        .await?;

        Ok(Snapshot {
            id: result.last_insert_rowid(),
            timestamp,
            clan_tag,
            clan_name,
            clan_level,
            clan_points,
            clan_capital_points,
            members,
            war_wins,
            war_losses,
            required_trophies,
        })
    }

    /// All snapshots, optionally filtered by clan tag, ascending by
    /// timestamp.
    pub async fn all_snapshots(
        &self,
        clan_tag: Option<&str>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let rows = match clan_tag {
            Some(tag) => {
                sqlx::query_as::<_, Snapshot>(
                    "SELECT * FROM clan_snapshots WHERE clan_tag = ? ORDER BY timestamp ASC",
                )
                .bind(tag)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Snapshot>(
                    "SELECT * FROM clan_snapshots ORDER BY timestamp ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// The single most recent snapshot for a tag, if any.
    pub async fn latest_snapshot(&self, clan_tag: &str) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM clan_snapshots WHERE clan_tag = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(clan_tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Inclusive range query, ascending by timestamp.
    pub async fn snapshots_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query_as::<_, Snapshot>(
            "SELECT * FROM clan_snapshots WHERE timestamp >= ? AND timestamp <= ? \
             ORDER BY timestamp ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_snapshots_since(&self, cutoff: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clan_snapshots WHERE timestamp >= ?",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Delete snapshots strictly older than `cutoff`; returns rows removed.
    pub async fn delete_snapshots_before(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM clan_snapshots WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Insert-or-replace a player record by tag.
    pub async fn upsert_player(&self, player: &PlayerRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO players
                (player_tag, player_name, town_hall_level, clan_role, last_active, activity_score)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_tag) DO UPDATE SET
                player_name = excluded.player_name,
                town_hall_level = excluded.town_hall_level,
                clan_role = excluded.clan_role,
                last_active = excluded.last_active,
                activity_score = excluded.activity_score
            "#,
        )
        .bind(&player.player_tag)
        .bind(&player.player_name)
        .bind(player.town_hall_level)
        .bind(&player.clan_role)
        .bind(player.last_active)
        .bind(player.activity_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn player(&self, player_tag: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let row = sqlx::query_as::<_, PlayerRecord>("SELECT * FROM players WHERE player_tag = ?")
            .bind(player_tag)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PlayerRecord>(
            "SELECT * FROM players ORDER BY player_name COLLATE NOCASE ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_war_stat(&self, stat: &NewWarStat) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO player_war_stats
                (player_tag, timestamp, war_stars, attack_wins, defense_wins,
                 donations, donations_received)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stat.player_tag)
        .bind(stat.timestamp)
        .bind(stat.war_stars)
        .bind(stat.attack_wins)
        .bind(stat.defense_wins)
        .bind(stat.donations)
        .bind(stat.donations_received)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// War stats for one player since `since` (inclusive), ascending.
    pub async fn war_stats_for(
        &self,
        player_tag: &str,
        since: i64,
    ) -> Result<Vec<PlayerWarStat>, StoreError> {
        let rows = sqlx::query_as::<_, PlayerWarStat>(
            "SELECT * FROM player_war_stats WHERE player_tag = ? AND timestamp >= ? \
             ORDER BY timestamp ASC",
        )
        .bind(player_tag)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent war stat for a player, used by the member poller to spot
    /// counter movement between polls.
    pub async fn latest_war_stat(
        &self,
        player_tag: &str,
    ) -> Result<Option<PlayerWarStat>, StoreError> {
        let row = sqlx::query_as::<_, PlayerWarStat>(
            "SELECT * FROM player_war_stats WHERE player_tag = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(player_tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_war_stats_before(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM player_war_stats WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
