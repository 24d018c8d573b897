//! In-memory processing of dryer readings for the dashboard table.
//!
//! The pipeline is fixed: time window → type, battery and search filters →
//! stable sort → page slice. The window set feeds the summary cards and
//! charts, the filtered set feeds the table and the exports. Because the
//! table filters are applied on top of the window, the table is always a
//! subset of what the charts show.

pub mod filter;
pub mod page;
pub mod sort;
pub mod summary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::DryerReading;

use self::{
    filter::{BatteryFilter, Search, TimeRange, TypeFilter},
    page::{paginate, Page, PageSize},
    sort::{sort_readings, Sort, SortKey, SortOrder},
};

/// A query value that is not one of the accepted choices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what}: {value:?}")]
pub struct ParseError {
    what: &'static str,
    value: String,
}

impl ParseError {
    pub(crate) fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// Everything the operator can change about the table, carried in the query
/// string so that every page, link and export is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub search: String,
    #[serde(rename = "type")]
    pub type_filter: TypeFilter,
    pub battery: BatteryFilter,
    pub range: TimeRange,
    pub sort: SortKey,
    pub order: SortOrder,
    pub page: usize,
    pub per_page: PageSize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search: String::new(),
            type_filter: TypeFilter::All,
            battery: BatteryFilter::All,
            range: TimeRange::Day,
            sort: SortKey::UpdatedAt,
            order: SortOrder::Desc,
            page: 1,
            per_page: PageSize::Ten,
        }
    }
}

impl ViewState {
    pub fn sort(&self) -> Sort {
        Sort::new(self.sort, self.order)
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn set_type_filter(&mut self, filter: TypeFilter) {
        self.type_filter = filter;
        self.page = 1;
    }

    pub fn set_battery(&mut self, filter: BatteryFilter) {
        self.battery = filter;
        self.page = 1;
    }

    pub fn set_range(&mut self, range: TimeRange) {
        self.range = range;
        self.page = 1;
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.per_page = size;
        self.page = 1;
    }

    /// Keeps the current page.
    pub fn toggle_sort(&mut self, key: SortKey) {
        let sort = self.sort().toggled(key);
        self.sort = sort.key;
        self.order = sort.order;
    }

    pub fn go_to(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Copy of this state with `change` applied, for building links.
    pub fn with(&self, change: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        change(&mut next);
        next
    }

    /// URL-encoded query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("search", &self.search)
            .append_pair("type", self.type_filter.as_str())
            .append_pair("battery", self.battery.as_str())
            .append_pair("range", self.range.as_str())
            .append_pair("sort", self.sort.as_str())
            .append_pair("order", self.order.as_str())
            .append_pair("page", &self.page.to_string())
            .append_pair("per_page", &self.per_page.get().to_string())
            .finish()
    }

    /// Run the pipeline against `readings` at wall-clock time `now`.
    pub fn apply<'a>(&self, readings: &'a [DryerReading], now: DateTime<Utc>) -> Listing<'a> {
        let window: Vec<&DryerReading> = readings
            .iter()
            .filter(|r| self.range.contains(now, r.updated_at))
            .collect();

        let search = Search::new(&self.search);
        let mut rows: Vec<&DryerReading> = window
            .iter()
            .copied()
            .filter(|r| self.type_filter.matches(&r.dryer_type))
            .filter(|r| self.battery.matches(r.bat_percentage))
            .filter(|r| search.matches(r))
            .collect();
        sort_readings(&mut rows, self.sort());

        Listing { window, rows }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Result of [`ViewState::apply`].
#[derive(Debug)]
pub struct Listing<'a> {
    /// Readings inside the time window, in input order.
    pub window: Vec<&'a DryerReading>,
    /// Window readings that pass every table filter, sorted.
    pub rows: Vec<&'a DryerReading>,
}

impl<'a> Listing<'a> {
    pub fn page(&self, view: &ViewState) -> Page<'_, &'a DryerReading> {
        paginate(&self.rows, view.page, view.per_page)
    }
}
