use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use utoipa::OpenApi;

use super::{
    dto::{
        DryerReadingDto, ReadingListResponse, ReadingsParams, SeriesParams, StatsResponse,
    },
    errors::AppError,
};
use crate::{
    auth::models::Admin,
    db::{self, ReadingsQuery},
    listing::{
        filter::{BatteryBucket, TimeRange},
        sort::{SortKey, SortOrder},
        summary::{series, SeriesPoint},
    },
    session::GateState,
    state::AppState,
    web::session_cookie,
};

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Paged list of readings with optional type search and sorting. Absent
/// values sort lowest.
#[utoipa::path(
    get,
    path = "/api/readings",
    params(ReadingsParams),
    responses(
        (status = 200, description = "One page of readings", body = ReadingListResponse),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "Session still loading"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<ReadingListResponse>, AppError> {
    let query = ReadingsQuery::from(params);
    let page = db::list_readings(&state.pool, &query).await?;

    Ok(Json(ReadingListResponse {
        data: page.rows.into_iter().map(Into::into).collect(),
        count: page.total,
        page: query.page,
        page_size: query.page_size,
    }))
}

/// Total number of readings and the five most recent ones.
#[utoipa::path(
    get,
    path = "/api/readings/stats",
    responses(
        (status = 200, description = "Reading statistics", body = StatsResponse),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "Session still loading"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn reading_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let stats = db::reading_stats(&state.pool).await?;

    Ok(Json(StatsResponse {
        total_items: stats.total,
        recent_items: stats.recent.into_iter().map(Into::into).collect(),
    }))
}

/// Chart series for a time window ending now, ordered by `updated_at ASC`.
#[utoipa::path(
    get,
    path = "/api/readings/series",
    params(SeriesParams),
    responses(
        (status = 200, description = "Chart points, oldest first", body = Vec<SeriesPoint>),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "Session still loading"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn reading_series(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<SeriesPoint>>, AppError> {
    let range = params.range.unwrap_or_default();
    let readings = db::fetch_all_readings(&state.pool, state.fetch_limit).await?;

    let now = Utc::now();
    let window: Vec<_> = readings
        .iter()
        .filter(|r| range.contains(now, r.updated_at))
        .collect();

    Ok(Json(series(&window)))
}

// ---------------------------------------------------------------------------
// Session & system
// ---------------------------------------------------------------------------

/// The session gate as seen by the calling browser's session cookie.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Signed-in admin for this browser (if any) and loading flag", body = GateState),
    ),
    tag = "session"
)]
pub async fn session_state(State(state): State<AppState>, jar: CookieJar) -> Json<GateState> {
    Json(state.gate.state(session_cookie::session_id(&jar)))
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(list_readings, reading_stats, reading_series, session_state, health),
    components(schemas(
        DryerReadingDto,
        ReadingListResponse,
        StatsResponse,
        SeriesPoint,
        BatteryBucket,
        TimeRange,
        SortKey,
        SortOrder,
        GateState,
        Admin,
    )),
    tags(
        (name = "readings", description = "Dryer reading endpoints"),
        (name = "session",  description = "Operator session"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Dryer Dashboard API",
        version = "0.1.0",
        description = "REST API for dryer telemetry behind the operator dashboard"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
