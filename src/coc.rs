// src/coc.rs
//! Clash of Clans API client.
//!
//! The [`ClanApi`] trait is the seam the pollers talk through, so tests can
//! substitute a stub without network access.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const API_BASE: &str = "https://api.clashofclans.com/v1";

/// Clan-level summary as returned by `/clans/{tag}`. Fields the upstream
/// sometimes omits default to zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClanSummary {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub clan_level: i64,
    #[serde(default)]
    pub clan_points: i64,
    #[serde(default)]
    pub clan_capital_points: i64,
    #[serde(default)]
    pub members: i64,
    #[serde(default)]
    pub war_wins: i64,
    #[serde(default)]
    pub war_losses: i64,
    #[serde(default)]
    pub required_trophies: i64,
}

/// Entry of `/clans/{tag}/members`.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRef {
    pub tag: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MemberList {
    #[serde(default)]
    items: Vec<MemberRef>,
}

/// Player detail as returned by `/players/{tag}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub town_hall_level: i64,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub war_stars: i64,
    #[serde(default)]
    pub attack_wins: i64,
    #[serde(default)]
    pub defense_wins: i64,
    #[serde(default)]
    pub donations: i64,
    #[serde(default)]
    pub donations_received: i64,
}

#[async_trait::async_trait]
pub trait ClanApi: Send + Sync {
    async fn fetch_clan(&self, clan_tag: &str) -> Result<ClanSummary>;
    async fn fetch_members(&self, clan_tag: &str) -> Result<Vec<MemberRef>>;
    async fn fetch_player(&self, player_tag: &str) -> Result<PlayerDetail>;
}

/// reqwest-backed client with bearer auth.
pub struct CocClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CocClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, API_BASE)
    }

    /// Base URL override for tests and proxies.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Tags carry a leading `#` that must travel percent-encoded.
    fn encode_tag(tag: &str) -> String {
        tag.replace('#', "%23")
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("api error: {status} for {url}");
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }
}

#[async_trait::async_trait]
impl ClanApi for CocClient {
    async fn fetch_clan(&self, clan_tag: &str) -> Result<ClanSummary> {
        self.get_json(&format!("/clans/{}", Self::encode_tag(clan_tag)))
            .await
    }

    async fn fetch_members(&self, clan_tag: &str) -> Result<Vec<MemberRef>> {
        let list: MemberList = self
            .get_json(&format!("/clans/{}/members", Self::encode_tag(clan_tag)))
            .await?;
        Ok(list.items)
    }

    async fn fetch_player(&self, player_tag: &str) -> Result<PlayerDetail> {
        self.get_json(&format!("/players/{}", Self::encode_tag(player_tag)))
            .await
    }
}
