use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ParseError;
use crate::db::models::DryerReading;

/// Columns the reading table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum SortKey {
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "t_set")]
    TargetTemperature,
    #[default]
    #[serde(rename = "updated_at")]
    UpdatedAt,
    #[serde(rename = "bat_percentage")]
    Battery,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Type,
        SortKey::TargetTemperature,
        SortKey::UpdatedAt,
        SortKey::Battery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Type => "type",
            SortKey::TargetTemperature => "t_set",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Battery => "bat_percentage",
        }
    }

    /// SQL expression used in `ORDER BY`. Strings sort case-insensitively.
    pub fn order_expr(self) -> &'static str {
        match self {
            SortKey::Type => r#"lower("type")"#,
            SortKey::TargetTemperature => "t_set",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Battery => "bat_percentage",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseError::new("sort key", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    /// `ORDER BY` suffix. Absent values sort lowest, matching [`compare`].
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC NULLS FIRST",
            SortOrder::Desc => "DESC NULLS LAST",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ParseError::new("sort order", other)),
        }
    }
}

/// The single active sort of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Clicking the active column flips the order; clicking another column
    /// selects it in descending order.
    pub fn toggled(self, key: SortKey) -> Self {
        if self.key == key {
            Self::new(key, self.order.flipped())
        } else {
            Self::new(key, SortOrder::Desc)
        }
    }
}

/// Stable in-place sort. Readings with equal keys keep their relative order.
pub fn sort_readings(rows: &mut [&DryerReading], sort: Sort) {
    match sort.order {
        SortOrder::Asc => rows.sort_by(|a, b| compare(a, b, sort.key)),
        SortOrder::Desc => rows.sort_by(|a, b| compare(b, a, sort.key)),
    }
}

/// Ascending comparison of two readings on `key`.
pub fn compare(a: &DryerReading, b: &DryerReading, key: SortKey) -> Ordering {
    match key {
        SortKey::Type => a
            .dryer_type
            .to_lowercase()
            .cmp(&b.dryer_type.to_lowercase()),
        SortKey::TargetTemperature => compare_optional(a.t_set, b.t_set),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::Battery => compare_optional(a.bat_percentage, b.bat_percentage),
    }
}

fn compare_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
