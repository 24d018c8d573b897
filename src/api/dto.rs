use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::{
        models::DryerReading,
        ReadingsQuery,
    },
    listing::{
        filter::{BatteryBucket, TimeRange},
        sort::{SortKey, SortOrder},
    },
};

/// Largest page the JSON list endpoint hands out.
pub const MAX_PAGE_SIZE: u32 = 1_000;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DryerReadingDto {
    pub id: i64,
    #[serde(rename = "type")]
    pub dryer_type: String,
    pub t_set: Option<f64>,
    pub h_set: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub t3: Option<f64>,
    pub t4: Option<f64>,
    pub h1: Option<f64>,
    pub h2: Option<f64>,
    pub h3: Option<f64>,
    pub h4: Option<f64>,
    /// Reported average, or the mean of the present `t1..t4`.
    pub t_ave: Option<f64>,
    /// Reported average, or the mean of the present `h1..h4`.
    pub h_ave: Option<f64>,
    pub bat_percentage: Option<f64>,
    pub battery_status: Option<BatteryBucket>,
    pub updated_at: DateTime<Utc>,
}

impl From<DryerReading> for DryerReadingDto {
    fn from(r: DryerReading) -> Self {
        Self {
            t_ave: r.average_temperature(),
            h_ave: r.average_humidity(),
            battery_status: r.bat_percentage.and_then(BatteryBucket::of),
            id: r.id,
            dryer_type: r.dryer_type,
            t_set: r.t_set,
            h_set: r.h_set,
            t1: r.t1,
            t2: r.t2,
            t3: r.t3,
            t4: r.t4,
            h1: r.h1,
            h2: r.h2,
            h3: r.h3,
            h4: r.h4,
            bat_percentage: r.bat_percentage,
            updated_at: r.updated_at,
        }
    }
}

/// Query parameters for `GET /api/readings`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadingsParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Rows per page (default 10, at most 1000).
    pub page_size: Option<u32>,
    /// Case-insensitive substring match on the type label.
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
}

impl From<ReadingsParams> for ReadingsQuery {
    fn from(p: ReadingsParams) -> Self {
        let defaults = ReadingsQuery::default();
        Self {
            page: p.page.unwrap_or(defaults.page).max(1),
            page_size: p
                .page_size
                .unwrap_or(defaults.page_size)
                .clamp(1, MAX_PAGE_SIZE),
            search: p.search,
            sort_by: p.sort_by.unwrap_or(defaults.sort_by),
            sort_order: p.sort_order.unwrap_or(defaults.sort_order),
        }
    }
}

/// Response for `GET /api/readings`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingListResponse {
    pub data: Vec<DryerReadingDto>,
    /// Matching rows across all pages.
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Response for `GET /api/readings/stats`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub total_items: i64,
    /// Newest first.
    pub recent_items: Vec<DryerReadingDto>,
}

/// Query parameters for `GET /api/readings/series`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SeriesParams {
    /// `1h`, `6h`, `24h` (default), `7d`, `30d` or `all`.
    pub range: Option<TimeRange>,
}
