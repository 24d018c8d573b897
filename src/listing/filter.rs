use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ParseError;
use crate::db::models::DryerReading;

// ---------------------------------------------------------------------------
// Battery buckets
// ---------------------------------------------------------------------------

/// Categorical battery level: low `[0, 20)`, medium `[20, 50)`, high `[50, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatteryBucket {
    Low,
    Medium,
    High,
}

impl BatteryBucket {
    /// Bucket of a battery percentage; `None` outside `[0, 100]`.
    pub fn of(percentage: f64) -> Option<Self> {
        if (0.0..20.0).contains(&percentage) {
            Some(BatteryBucket::Low)
        } else if (20.0..50.0).contains(&percentage) {
            Some(BatteryBucket::Medium)
        } else if (50.0..=100.0).contains(&percentage) {
            Some(BatteryBucket::High)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BatteryBucket::Low => "Low",
            BatteryBucket::Medium => "Medium",
            BatteryBucket::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatteryFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl BatteryFilter {
    pub const ALL: [BatteryFilter; 4] = [
        BatteryFilter::All,
        BatteryFilter::Low,
        BatteryFilter::Medium,
        BatteryFilter::High,
    ];

    pub fn bucket(self) -> Option<BatteryBucket> {
        match self {
            BatteryFilter::All => None,
            BatteryFilter::Low => Some(BatteryBucket::Low),
            BatteryFilter::Medium => Some(BatteryBucket::Medium),
            BatteryFilter::High => Some(BatteryBucket::High),
        }
    }

    /// A reading without a battery value only passes the `all` filter.
    pub fn matches(self, percentage: Option<f64>) -> bool {
        match self.bucket() {
            None => true,
            Some(bucket) => percentage.and_then(BatteryBucket::of) == Some(bucket),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatteryFilter::All => "all",
            BatteryFilter::Low => "low",
            BatteryFilter::Medium => "medium",
            BatteryFilter::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BatteryFilter::All => "All levels",
            BatteryFilter::Low => "Low (< 20%)",
            BatteryFilter::Medium => "Medium (20-49%)",
            BatteryFilter::High => "High (50%+)",
        }
    }
}

impl FromStr for BatteryFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatteryFilter::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ParseError::new("battery filter", s))
    }
}

// ---------------------------------------------------------------------------
// Type filter
// ---------------------------------------------------------------------------

/// Exact match on the crop/material label, or `all`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeFilter {
    #[default]
    All,
    Exact(String),
}

impl TypeFilter {
    pub fn matches(&self, dryer_type: &str) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Exact(wanted) => wanted == dryer_type,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Exact(wanted) => wanted,
        }
    }
}

impl From<String> for TypeFilter {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "all" => TypeFilter::All,
            _ => TypeFilter::Exact(s),
        }
    }
}

impl From<TypeFilter> for String {
    fn from(f: TypeFilter) -> Self {
        f.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Time range
// ---------------------------------------------------------------------------

/// Relative window ending at the current wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::Hour,
        TimeRange::SixHours,
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::All,
    ];

    pub fn window(self) -> Option<TimeDelta> {
        match self {
            TimeRange::Hour => Some(TimeDelta::hours(1)),
            TimeRange::SixHours => Some(TimeDelta::hours(6)),
            TimeRange::Day => Some(TimeDelta::hours(24)),
            TimeRange::Week => Some(TimeDelta::days(7)),
            TimeRange::Month => Some(TimeDelta::days(30)),
            TimeRange::All => None,
        }
    }

    /// Oldest timestamp still inside the window.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }

    pub fn contains(self, now: DateTime<Utc>, at: DateTime<Utc>) -> bool {
        self.cutoff(now).is_none_or(|cutoff| at >= cutoff)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::All => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Hour => "1 hour",
            TimeRange::SixHours => "6 hours",
            TimeRange::Day => "24 hours",
            TimeRange::Week => "7 days",
            TimeRange::Month => "30 days",
            TimeRange::All => "All time",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseError::new("time range", s))
    }
}

// ---------------------------------------------------------------------------
// Free-text search
// ---------------------------------------------------------------------------

/// Case-insensitive substring search over the type label and the display
/// form of every numeric field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    needle: String,
}

impl Search {
    pub fn new(term: &str) -> Self {
        Self {
            needle: term.trim().to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, reading: &DryerReading) -> bool {
        if self.is_empty() {
            return true;
        }
        if reading.dryer_type.to_lowercase().contains(&self.needle) {
            return true;
        }
        if reading.id.to_string().contains(&self.needle) {
            return true;
        }
        reading
            .numeric_fields()
            .into_iter()
            .flatten()
            .any(|v| v.to_string().contains(&self.needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(BatteryBucket::of(0.0), Some(BatteryBucket::Low));
        assert_eq!(BatteryBucket::of(19.99), Some(BatteryBucket::Low));
        assert_eq!(BatteryBucket::of(20.0), Some(BatteryBucket::Medium));
        assert_eq!(BatteryBucket::of(49.9), Some(BatteryBucket::Medium));
        assert_eq!(BatteryBucket::of(50.0), Some(BatteryBucket::High));
        assert_eq!(BatteryBucket::of(100.0), Some(BatteryBucket::High));
        assert_eq!(BatteryBucket::of(-1.0), None);
        assert_eq!(BatteryBucket::of(100.5), None);
    }

    #[test]
    fn battery_filter_excludes_missing_values_unless_all() {
        assert!(BatteryFilter::All.matches(None));
        assert!(!BatteryFilter::Low.matches(None));
        assert!(BatteryFilter::Low.matches(Some(15.0)));
        assert!(!BatteryFilter::Low.matches(Some(20.0)));
        assert!(BatteryFilter::High.matches(Some(55.0)));
    }

    #[test]
    fn type_filter_from_query_value() {
        assert_eq!(TypeFilter::from("all".to_owned()), TypeFilter::All);
        assert_eq!(TypeFilter::from(String::new()), TypeFilter::All);
        let rice = TypeFilter::from("Rice".to_owned());
        assert!(rice.matches("Rice"));
        assert!(!rice.matches("rice"));
        assert!(!rice.matches("Corn"));
    }

    #[test]
    fn time_range_cutoff_is_inclusive() {
        let now = Utc::now();
        assert!(TimeRange::Hour.contains(now, now - TimeDelta::hours(1)));
        assert!(!TimeRange::Hour.contains(now, now - TimeDelta::minutes(61)));
        assert!(TimeRange::Week.contains(now, now - TimeDelta::days(6)));
        assert!(TimeRange::All.contains(now, now - TimeDelta::days(3650)));
    }

    #[test]
    fn time_range_parses_query_values() {
        for range in TimeRange::ALL {
            assert_eq!(range.as_str().parse::<TimeRange>().unwrap(), range);
        }
        assert!("2h".parse::<TimeRange>().is_err());
    }

    #[test]
    fn search_is_case_insensitive() {
        let r = DryerReading::new(7, "Low", Utc::now());
        assert!(Search::new("LOW").matches(&r));
        assert!(Search::new("low").matches(&r));
        assert!(Search::new("  lo ").matches(&r));
    }

    #[test]
    fn search_matches_numeric_fields_and_skips_absent_ones() {
        let mut r = DryerReading::new(3, "Rice", Utc::now());
        r.t1 = Some(70.0);
        r.h2 = Some(48.5);
        assert!(Search::new("70").matches(&r));
        assert!(Search::new("48.5").matches(&r));
        assert!(!Search::new("99").matches(&r));
        // absent values must not render as "0" and match
        assert!(!Search::new("0.0").matches(&r));
    }

    #[test]
    fn empty_search_matches_everything() {
        let r = DryerReading::new(1, "", Utc::now());
        assert!(Search::new("").matches(&r));
    }
}
