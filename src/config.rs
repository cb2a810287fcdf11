// src/config.rs
//! Runtime configuration: required identity/credentials from the
//! environment (loaded via dotenv in `main`), optional sweep tuning from a
//! TOML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::store::{GapFillConfig, RetentionConfig};

const ENV_CONFIG_PATH: &str = "TRACKER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub coc_api_key: String,
    pub clan_tag: String,
    pub database_url: String,
    pub poll_interval_secs: u64,
    pub member_poll_interval_secs: u64,
    pub retention: RetentionConfig,
    pub gapfill: GapFillConfig,
}

impl AppConfig {
    /// Read configuration from the environment, failing fast with context
    /// when a required variable is missing. Sweep tuning comes from
    /// `$TRACKER_CONFIG_PATH` or `config/tracker.toml` when present.
    pub fn load() -> Result<Self> {
        let coc_api_key =
            std::env::var("COC_API_KEY").context("COC_API_KEY is not set in the environment")?;
        let clan_tag =
            std::env::var("CLAN_TAG").context("CLAN_TAG is not set in the environment")?;

        let tuning = load_tuning_default()?;

        Ok(Self {
            port: env_parse("PORT", 4000)?,
            coc_api_key,
            clan_tag,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/clan_tracker.db".to_string()),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 60)?,
            member_poll_interval_secs: env_parse("MEMBER_POLL_INTERVAL_SECS", 300)?,
            retention: tuning.retention(),
            gapfill: tuning.gapfill(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v.parse::<T>().with_context(|| format!("parsing {key}={v}")),
        Err(_) => Ok(default),
    }
}

/// Optional sweep tuning file. Missing sections and fields fall back to the
/// defaults from the store layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TuningFile {
    retention: RetentionToml,
    gapfill: GapFillToml,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RetentionToml {
    recent_window_days: Option<i64>,
    min_recent_snapshots: Option<i64>,
    snapshot_max_age_days: Option<i64>,
    war_stat_max_age_days: Option<i64>,
    interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct GapFillToml {
    lookback_days: Option<i64>,
    step_secs: Option<i64>,
    interval_secs: Option<u64>,
}

impl TuningFile {
    pub fn retention(&self) -> RetentionConfig {
        let d = RetentionConfig::default();
        RetentionConfig {
            recent_window_days: self.retention.recent_window_days.unwrap_or(d.recent_window_days),
            min_recent_snapshots: self
                .retention
                .min_recent_snapshots
                .unwrap_or(d.min_recent_snapshots),
            snapshot_max_age_days: self
                .retention
                .snapshot_max_age_days
                .unwrap_or(d.snapshot_max_age_days),
            war_stat_max_age_days: self
                .retention
                .war_stat_max_age_days
                .unwrap_or(d.war_stat_max_age_days),
            interval_secs: self.retention.interval_secs.unwrap_or(d.interval_secs),
        }
    }

    pub fn gapfill(&self) -> GapFillConfig {
        let d = GapFillConfig::default();
        GapFillConfig {
            lookback_days: self.gapfill.lookback_days.unwrap_or(d.lookback_days),
            step_secs: self.gapfill.step_secs.unwrap_or(d.step_secs),
            interval_secs: self.gapfill.interval_secs.unwrap_or(d.interval_secs),
        }
    }
}

pub fn load_tuning_from(path: &Path) -> Result<TuningFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading tuning from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Tuning lookup: `$TRACKER_CONFIG_PATH`, then `config/tracker.toml`, then
/// built-in defaults.
pub fn load_tuning_default() -> Result<TuningFile> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        return load_tuning_from(&pb);
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default.exists() {
        return load_tuning_from(&default);
    }
    Ok(TuningFile::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tuning_falls_back_to_defaults() {
        let t: TuningFile = toml::from_str("").unwrap();
        let r = t.retention();
        assert_eq!(r.min_recent_snapshots, 1000);
        assert_eq!(r.snapshot_max_age_days, 30);
        let g = t.gapfill();
        assert_eq!(g.step_secs, 300);
        assert_eq!(g.lookback_days, 7);
    }

    #[test]
    fn partial_tuning_overrides_only_named_fields() {
        let t: TuningFile = toml::from_str(
            r#"
            [retention]
            min_recent_snapshots = 50

            [gapfill]
            step_secs = 60
            "#,
        )
        .unwrap();
        let r = t.retention();
        assert_eq!(r.min_recent_snapshots, 50);
        assert_eq!(r.snapshot_max_age_days, 30);
        assert_eq!(t.gapfill().step_secs, 60);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_points_at_tuning_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "[retention]\nsnapshot_max_age_days = 14\n").unwrap();

        std::env::set_var(ENV_CONFIG_PATH, path.display().to_string());
        let t = load_tuning_default().unwrap();
        assert_eq!(t.retention().snapshot_max_age_days, 14);
        std::env::remove_var(ENV_CONFIG_PATH);
    }
}
