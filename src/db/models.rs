use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of `dryer_data`: a timestamped snapshot of the dryer's sensors.
///
/// Every sensor column is nullable. An absent value is never treated as zero:
/// it renders as a "no data" marker and is skipped by averages.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DryerReading {
    pub id: i64,
    /// Crop/material label, e.g. `"Corn"`.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub dryer_type: String,
    /// Configured target temperature.
    pub t_set: Option<f64>,
    /// Configured target humidity.
    pub h_set: Option<f64>,
    /// Inlet temperature.
    pub t1: Option<f64>,
    /// Drying chamber 1 temperature.
    pub t2: Option<f64>,
    /// Drying chamber 2 temperature.
    pub t3: Option<f64>,
    /// Outlet temperature.
    pub t4: Option<f64>,
    pub h1: Option<f64>,
    pub h2: Option<f64>,
    pub h3: Option<f64>,
    pub h4: Option<f64>,
    pub t_ave: Option<f64>,
    pub h_ave: Option<f64>,
    /// Battery level, 0–100.
    pub bat_percentage: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl DryerReading {
    /// A reading with every sensor value absent.
    pub fn new(id: i64, dryer_type: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            dryer_type: dryer_type.into(),
            t_set: None,
            h_set: None,
            t1: None,
            t2: None,
            t3: None,
            t4: None,
            h1: None,
            h2: None,
            h3: None,
            h4: None,
            t_ave: None,
            h_ave: None,
            bat_percentage: None,
            updated_at,
        }
    }

    pub fn temperatures(&self) -> [Option<f64>; 4] {
        [self.t1, self.t2, self.t3, self.t4]
    }

    pub fn humidities(&self) -> [Option<f64>; 4] {
        [self.h1, self.h2, self.h3, self.h4]
    }

    /// `t_ave` as reported by the device, or the mean of the present
    /// `t1..t4` when the device did not report one.
    pub fn average_temperature(&self) -> Option<f64> {
        self.t_ave.or_else(|| mean_of_present(&self.temperatures()))
    }

    /// `h_ave` as reported by the device, or the mean of the present `h1..h4`.
    pub fn average_humidity(&self) -> Option<f64> {
        self.h_ave.or_else(|| mean_of_present(&self.humidities()))
    }

    /// Every numeric column in table order, used by free-text search.
    pub fn numeric_fields(&self) -> [Option<f64>; 13] {
        [
            self.t_set,
            self.h_set,
            self.t1,
            self.t2,
            self.t3,
            self.t4,
            self.h1,
            self.h2,
            self.h3,
            self.h4,
            self.t_ave,
            self.h_ave,
            self.bat_percentage,
        ]
    }
}

/// Mean of the `Some` values; `None` when there are none.
pub fn mean_of_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> DryerReading {
        DryerReading::new(1, "Corn", Utc::now())
    }

    #[test]
    fn reported_average_wins_over_derived() {
        let mut r = reading();
        r.t1 = Some(60.0);
        r.t_ave = Some(65.0);
        assert_eq!(r.average_temperature(), Some(65.0));
    }

    #[test]
    fn derived_average_skips_absent_sensors() {
        let mut r = reading();
        r.h1 = Some(40.0);
        r.h3 = Some(50.0);
        // h2 and h4 are absent and must not pull the mean towards zero
        assert_eq!(r.average_humidity(), Some(45.0));
    }

    #[test]
    fn average_is_absent_without_any_sensor() {
        assert_eq!(reading().average_temperature(), None);
        assert_eq!(mean_of_present(&[]), None);
    }
}
