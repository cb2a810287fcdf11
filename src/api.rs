use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::store::{PlayerRecord, PlayerWarStat, Snapshot, StoreError, TrackerStore};
use crate::trends::{self, ActivitySeries, CumulativeSample};

const DAY_SECS: i64 = 86_400;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TrackerStore>,
    pub clan_tag: String,
}

impl AppState {
    pub fn new(store: Arc<TrackerStore>, clan_tag: impl Into<String>) -> Self {
        Self {
            store,
            clan_tag: clan_tag.into(),
        }
    }
}

/// Read-only dashboard API. Mutation happens only through the pollers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/clan/latest", get(clan_latest))
        .route("/api/clan/history", get(clan_history))
        .route("/api/snapshots", get(snapshots))
        .route("/api/players", get(players))
        .route("/api/players/{tag}/stats", get(player_stats))
        .route("/api/players/{tag}/activity", get(player_activity))
        .fallback_service(ServeDir::new("public"))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Storage failures surface as 500 with a JSON error body; details go to
/// the log, not the client.
struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("api request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

#[derive(serde::Serialize)]
struct LatestResp {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Snapshot>,
}

async fn clan_latest(State(state): State<AppState>) -> Result<Json<LatestResp>, ApiError> {
    let latest = state.store.latest_snapshot(&state.clan_tag).await?;
    Ok(Json(LatestResp {
        found: latest.is_some(),
        data: latest,
    }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    days: Option<i64>,
}

#[derive(serde::Serialize)]
struct DataResp<T> {
    data: T,
}

async fn clan_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<DataResp<Vec<Snapshot>>>, ApiError> {
    let rows = match q.days {
        Some(days) => {
            let now = Utc::now().timestamp();
            state
                .store
                .snapshots_in_range(now - days.max(0) * DAY_SECS, now)
                .await?
        }
        None => state.store.all_snapshots(None).await?,
    };
    Ok(Json(DataResp { data: rows }))
}

/// Legacy dashboard contract: the bare ascending array.
async fn snapshots(State(state): State<AppState>) -> Result<Json<Vec<Snapshot>>, ApiError> {
    Ok(Json(state.store.all_snapshots(None).await?))
}

async fn players(
    State(state): State<AppState>,
) -> Result<Json<DataResp<Vec<PlayerRecord>>>, ApiError> {
    Ok(Json(DataResp {
        data: state.store.players().await?,
    }))
}

#[derive(Deserialize)]
struct StatsQuery {
    days: Option<i64>,
    window: Option<usize>,
}

async fn player_stats(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<DataResp<Vec<PlayerWarStat>>>, ApiError> {
    let since = Utc::now().timestamp() - q.days.unwrap_or(30).max(0) * DAY_SECS;
    Ok(Json(DataResp {
        data: state.store.war_stats_for(&tag, since).await?,
    }))
}

/// Server-side convenience for the chart renderer: the derived daily
/// deltas plus trailing moving average for one player.
async fn player_activity(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<ActivitySeries>, ApiError> {
    let since = Utc::now().timestamp() - q.days.unwrap_or(30).max(0) * DAY_SECS;
    let stats = state.store.war_stats_for(&tag, since).await?;
    let samples: Vec<CumulativeSample> = stats.iter().map(CumulativeSample::from).collect();
    Ok(Json(trends::derive_activity(&samples, q.window.unwrap_or(7))))
}
