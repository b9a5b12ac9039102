//! HTTP surface: result submission plus the dashboard's ranking, history,
//! and analytics queries.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::analytics::{
    self, activity_series, clear_time_histogram, AnalyticsSummary, LabelStyle, MapHistogram,
};
use crate::config::Config;
use crate::store::{GameStore, StoreError, Submission};

/// Best results shown per map on the main ranking view
pub const RANKING_LIMIT: u32 = 20;
/// History is capped, newest first, with no further pagination
pub const HISTORY_LIMIT: u32 = 100;
/// Default page size for the ranking "more" query
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub store: GameStore,
    pub api_token: Option<String>,
    pub display_offset: FixedOffset,
    pub submissions_enabled: bool,
}

impl AppState {
    pub fn new(store: GameStore, config: &Config) -> Self {
        let display_offset = FixedOffset::east_opt(config.display_utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self {
            store,
            api_token: config.api_token.clone(),
            display_offset,
            submissions_enabled: config.submissions_enabled,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/game/submit", post(submit))
        .route("/api/stats/ranking", get(ranking))
        .route("/api/stats/ranking/more", get(ranking_more))
        .route("/api/stats/history", get(history))
        .route("/api/stats/analytics", get(stats_analytics))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    device_id: String,
    map_name: String,
    clear_time: f64,
    jump_count: i64,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Storage failures surface as a generic 500; details go to the log only.
fn internal_error(err: StoreError) -> Response {
    log::error!("❌ Storage error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "Internal Server Error" })),
    )
        .into_response()
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Response {
    if !state.submissions_enabled {
        return (
            StatusCode::GONE,
            Json(json!({ "success": false, "error": "Submissions are closed" })),
        )
            .into_response();
    }

    if let Some(ref token) = state.api_token {
        if bearer_token(&headers) != Some(token.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "error": "Unauthorized" })),
            )
                .into_response();
        }
    }

    let submission = Submission {
        device_id: body.device_id,
        map_name: body.map_name,
        clear_time: body.clear_time,
        jump_count: body.jump_count,
    };

    match state.store.submit_result(&submission) {
        Ok(()) => {
            log::debug!(
                "✅ Result recorded: device={} map={} time={:.3}s jumps={}",
                submission.device_id,
                submission.map_name,
                submission.clear_time,
                submission.jump_count
            );
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn ranking(State(state): State<AppState>) -> Response {
    match state.store.ranking(RANKING_LIMIT) {
        Ok(by_map) => Json(by_map).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankingPageParams {
    map_name: String,
    /// Non-negative; a negative value fails u32 deserialization up front.
    offset: u32,
    limit: Option<u32>,
}

async fn ranking_more(
    State(state): State<AppState>,
    Query(params): Query<RankingPageParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "limit must be positive" })),
        )
            .into_response();
    }

    match state
        .store
        .ranking_page(&params.map_name, params.offset, limit)
    {
        Ok(items) => Json(items).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn history(State(state): State<AppState>) -> Response {
    match state.store.history(HISTORY_LIMIT) {
        Ok(items) => Json(items).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn stats_analytics(State(state): State<AppState>) -> Response {
    let now = Utc::now().timestamp();
    match build_analytics(&state.store, now, state.display_offset) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Compute the full analytics payload from storage as of `now`.
///
/// Everything is derived on demand from the raw result set; running this
/// twice against unchanged data yields identical output.
pub fn build_analytics(
    store: &GameStore,
    now: i64,
    display_offset: FixedOffset,
) -> Result<AnalyticsSummary, StoreError> {
    let total_plays = store.total_plays()?;

    let recent_timestamps = store.result_timestamps_since(now - analytics::RECENT_WINDOW_SECS)?;
    let recent_activity = activity_series(
        &recent_timestamps,
        analytics::RECENT_BUCKET_SECS,
        LabelStyle::TimeOfDay,
        display_offset,
    );

    let trend_timestamps = store.result_timestamps_since(now - analytics::TREND_WINDOW_SECS)?;
    let activity_trend = activity_series(
        &trend_timestamps,
        analytics::TREND_BUCKET_SECS,
        LabelStyle::DateAndTime,
        display_offset,
    );

    // map_names() is already sorted ascending, which fixes histogram order.
    let mut histograms = Vec::new();
    for map_name in store.map_names()? {
        let clear_times = store.clear_times_for_map(&map_name)?;
        if let Some(data) = clear_time_histogram(&clear_times) {
            histograms.push(MapHistogram { map_name, data });
        }
    }

    Ok(AnalyticsSummary {
        total_plays,
        recent_activity,
        activity_trend,
        histograms,
    })
}
