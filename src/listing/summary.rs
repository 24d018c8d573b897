use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::filter::BatteryBucket;
use crate::db::models::{mean_of_present, DryerReading};

/// Figures shown on the summary cards for the selected time window.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    /// Most recently updated reading in the window.
    pub latest: Option<DryerReading>,
    /// Mean of the per-reading average temperatures that are present.
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub battery: Option<f64>,
    pub battery_bucket: Option<BatteryBucket>,
}

pub fn summarize(window: &[&DryerReading]) -> Summary {
    let latest = window.iter().max_by_key(|r| r.updated_at).map(|r| (*r).clone());
    let temperatures: Vec<Option<f64>> = window.iter().map(|r| r.average_temperature()).collect();
    let humidities: Vec<Option<f64>> = window.iter().map(|r| r.average_humidity()).collect();
    let battery = latest.as_ref().and_then(|r| r.bat_percentage);

    Summary {
        count: window.len(),
        mean_temperature: mean_of_present(&temperatures),
        mean_humidity: mean_of_present(&humidities),
        battery,
        battery_bucket: battery.and_then(BatteryBucket::of),
        latest,
    }
}

/// One chart sample. Absent sensor values stay `null` so charts show gaps
/// rather than drops to zero.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeriesPoint {
    pub at: DateTime<Utc>,
    pub inlet_temperature: Option<f64>,
    pub chamber1_temperature: Option<f64>,
    pub chamber2_temperature: Option<f64>,
    pub outlet_temperature: Option<f64>,
    pub inlet_humidity: Option<f64>,
    pub chamber1_humidity: Option<f64>,
    pub chamber2_humidity: Option<f64>,
    pub outlet_humidity: Option<f64>,
    pub battery: Option<f64>,
}

impl From<&DryerReading> for SeriesPoint {
    fn from(r: &DryerReading) -> Self {
        Self {
            at: r.updated_at,
            inlet_temperature: r.t1,
            chamber1_temperature: r.t2,
            chamber2_temperature: r.t3,
            outlet_temperature: r.t4,
            inlet_humidity: r.h1,
            chamber1_humidity: r.h2,
            chamber2_humidity: r.h3,
            outlet_humidity: r.h4,
            battery: r.bat_percentage,
        }
    }
}

/// Window readings as chart points, oldest first.
pub fn series(window: &[&DryerReading]) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = window.iter().map(|r| SeriesPoint::from(*r)).collect();
    points.sort_by_key(|p| p.at);
    points
}

/// Sorted, de-duplicated type labels for the type filter.
pub fn distinct_types(readings: &[DryerReading]) -> Vec<String> {
    readings
        .iter()
        .filter(|r| !r.dryer_type.is_empty())
        .map(|r| r.dryer_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
