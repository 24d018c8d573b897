//! Tabular output of a filtered and sorted reading set: CSV download,
//! printable HTML, and the cell formatting the dashboard table shares with
//! both.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::DryerReading;

/// Column titles, in the fixed export order.
pub const COLUMNS: [&str; 13] = [
    "ID",
    "Type",
    "Target Temp",
    "T1",
    "T2",
    "T3",
    "T4",
    "H1",
    "H2",
    "H3",
    "H4",
    "Battery %",
    "Updated At",
];

/// Shown wherever a sensor value is absent.
pub const NO_DATA: &str = "N/A";

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Cell formatting
// ---------------------------------------------------------------------------

pub fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_owned(), |v| v.to_string())
}

/// One decimal place, for averages.
pub fn format_mean(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_owned(), |v| format!("{v:.1}"))
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Row cells in [`COLUMNS`] order; `absent` stands in for missing values.
fn cells(r: &DryerReading, absent: &str) -> [String; 13] {
    let value = |v: Option<f64>| v.map_or_else(|| absent.to_owned(), |v| v.to_string());
    [
        r.id.to_string(),
        r.dryer_type.clone(),
        value(r.t_set),
        value(r.t1),
        value(r.t2),
        value(r.t3),
        value(r.t4),
        value(r.h1),
        value(r.h2),
        value(r.h3),
        value(r.h4),
        value(r.bat_percentage),
        format_time(r.updated_at),
    ]
}

/// Cells as shown on screen and in print, with [`NO_DATA`] for gaps.
pub fn display_cells(r: &DryerReading) -> [String; 13] {
    cells(r, NO_DATA)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Header plus one row per reading, in the given order. Absent values are
/// empty cells.
pub fn to_csv(rows: &[&DryerReading]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for r in rows {
        writer.write_record(cells(r, ""))?;
    }
    writer.into_inner().context("failed to flush CSV output")
}

pub fn csv_file_name(now: DateTime<Utc>) -> String {
    format!("dryer-data-{}.csv", now.format("%Y%m%d-%H%M%S"))
}

// ---------------------------------------------------------------------------
// Printable HTML
// ---------------------------------------------------------------------------

/// Standalone HTML table that opens the browser's print dialog on load.
pub fn to_printable_html(rows: &[&DryerReading], now: DateTime<Utc>) -> String {
    let rows: Vec<[String; 13]> = rows.iter().map(|r| display_cells(r)).collect();
    PrintReport {
        generated_at: &format_time(now),
        columns: &COLUMNS,
        rows: &rows,
    }
    .to_string()
}

markup::define! {
    PrintReport<'a>(generated_at: &'a str, columns: &'a [&'static str], rows: &'a [[String; 13]]) {
        @markup::doctype()
        html[lang = "en"] {
            head {
                meta[charset = "utf-8"];
                title { "Dryer Data Report" }
                style {
                    "body { font-family: sans-serif; margin: 1.5rem; }"
                    "table { border-collapse: collapse; width: 100%; font-size: 12px; }"
                    "th, td { border: 1px solid #999; padding: 4px 6px; text-align: left; }"
                    "th { background: #eee; }"
                }
            }
            body {
                h1 { "Dryer Data Report" }
                p { "Generated " @generated_at " UTC, " @rows.len() " readings" }
                table {
                    thead {
                        tr {
                            @for column in columns.iter() {
                                th { @column }
                            }
                        }
                    }
                    tbody {
                        @for row in rows.iter() {
                            tr {
                                @for cell in row.iter() {
                                    td { @cell }
                                }
                            }
                        }
                    }
                }
                script { @markup::raw("window.addEventListener('load', () => window.print());") }
            }
        }
    }
}
