//! Display-ready data for the dashboard template. Everything the template
//! shows is computed here as strings and links.

use chrono::{DateTime, Utc};

use crate::{
    db::models::DryerReading,
    export::{display_cells, format_mean, format_time, format_value, COLUMNS, NO_DATA},
    listing::{
        filter::{BatteryFilter, TimeRange},
        page::PageSize,
        sort::{SortKey, SortOrder},
        summary::{distinct_types, series, summarize},
        ViewState,
    },
};

/// Sortable columns, by position in [`COLUMNS`].
const SORTABLE: [(usize, SortKey); 4] = [
    (1, SortKey::Type),
    (2, SortKey::TargetTemperature),
    (11, SortKey::Battery),
    (12, SortKey::UpdatedAt),
];

#[derive(Debug)]
pub struct Dashboard {
    pub admin_name: String,
    pub filters: Filters,
    pub cards: Cards,
    /// Chart series as JSON, safe to embed in a `<script>` element.
    pub series_json: String,
    pub table: Table,
    pub csv_href: String,
    pub print_href: String,
}

/// Current values and choices for the filter form.
#[derive(Debug)]
pub struct Filters {
    pub search: String,
    pub sort: &'static str,
    pub order: &'static str,
    pub types: Vec<Choice>,
    pub battery: Vec<Choice>,
    pub ranges: Vec<Choice>,
    pub page_sizes: Vec<Choice>,
}

#[derive(Debug)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug)]
pub struct Cards {
    pub range: &'static str,
    pub count: usize,
    pub latest_at: String,
    pub mean_temperature: String,
    pub mean_humidity: String,
    /// Latest `t1..t4`.
    pub temperatures: [String; 4],
    /// Latest `h1..h4`.
    pub humidities: [String; 4],
    pub battery: String,
    pub battery_status: &'static str,
}

#[derive(Debug)]
pub struct Table {
    pub headers: Vec<Header>,
    pub rows: Vec<[String; 13]>,
    pub pager: Pager,
}

#[derive(Debug)]
pub struct Header {
    pub label: &'static str,
    /// Link that sorts by this column; `None` for unsortable columns.
    pub href: Option<String>,
    pub indicator: &'static str,
}

#[derive(Debug)]
pub struct Pager {
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub first_item: usize,
    pub last_item: usize,
    /// `None` on the first page.
    pub previous: Option<String>,
    /// `None` on the last page.
    pub next: Option<String>,
}

impl Dashboard {
    pub fn build(
        admin_name: &str,
        view: &ViewState,
        readings: &[DryerReading],
        now: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let listing = view.apply(readings, now);
        let page = listing.page(view);

        let headers = COLUMNS
            .iter()
            .enumerate()
            .map(|(i, label)| header(view, i, *label))
            .collect();

        let pager = Pager {
            number: page.number,
            total_pages: page.total_pages,
            total_items: page.total_items,
            first_item: page.first_item(),
            last_item: page.last_item(),
            previous: page
                .has_previous()
                .then(|| link("/dashboard", &view.with(|v| v.go_to(page.number - 1)))),
            next: page
                .has_next()
                .then(|| link("/dashboard", &view.with(|v| v.go_to(page.number + 1)))),
        };

        let table = Table {
            headers,
            rows: page.items.iter().map(|r| display_cells(r)).collect(),
            pager,
        };

        // Exports cover the whole filtered set, so the page is irrelevant.
        let export_view = view.with(|v| v.go_to(1));

        Ok(Self {
            admin_name: admin_name.to_owned(),
            filters: filters(view, readings),
            cards: cards(view, &listing.window),
            series_json: script_safe_json(&series(&listing.window))?,
            table,
            csv_href: link("/export/csv", &export_view),
            print_href: link("/export/print", &export_view),
        })
    }
}

fn link(path: &str, view: &ViewState) -> String {
    format!("{path}?{}", view.to_query())
}

fn header(view: &ViewState, index: usize, label: &'static str) -> Header {
    let Some((_, key)) = SORTABLE.iter().find(|(i, _)| *i == index) else {
        return Header {
            label,
            href: None,
            indicator: "",
        };
    };

    let indicator = match (view.sort == *key, view.order) {
        (false, _) => "",
        (true, SortOrder::Asc) => " ▲",
        (true, SortOrder::Desc) => " ▼",
    };
    Header {
        label,
        href: Some(link("/dashboard", &view.with(|v| v.toggle_sort(*key)))),
        indicator,
    }
}

fn filters(view: &ViewState, readings: &[DryerReading]) -> Filters {
    let mut types = vec![Choice {
        value: "all".into(),
        label: "All types".into(),
        selected: view.type_filter.as_str() == "all",
    }];
    types.extend(distinct_types(readings).into_iter().map(|t| Choice {
        selected: view.type_filter.as_str() == t,
        label: t.clone(),
        value: t,
    }));

    Filters {
        search: view.search.clone(),
        sort: view.sort.as_str(),
        order: view.order.as_str(),
        types,
        battery: BatteryFilter::ALL
            .iter()
            .map(|b| Choice {
                value: b.as_str().into(),
                label: b.label().into(),
                selected: *b == view.battery,
            })
            .collect(),
        ranges: TimeRange::ALL
            .iter()
            .map(|r| Choice {
                value: r.as_str().into(),
                label: r.label().into(),
                selected: *r == view.range,
            })
            .collect(),
        page_sizes: PageSize::ALL
            .iter()
            .map(|s| Choice {
                value: s.get().to_string(),
                label: format!("{} per page", s.get()),
                selected: *s == view.per_page,
            })
            .collect(),
    }
}

fn cards(view: &ViewState, window: &[&DryerReading]) -> Cards {
    let summary = summarize(window);
    let latest = summary.latest.as_ref();
    let values = |f: fn(&DryerReading) -> [Option<f64>; 4]| {
        latest.map_or_else(
            || std::array::from_fn(|_| NO_DATA.to_owned()),
            |r| f(r).map(format_value),
        )
    };

    Cards {
        range: view.range.label(),
        count: summary.count,
        latest_at: latest.map_or_else(|| NO_DATA.to_owned(), |r| format_time(r.updated_at)),
        mean_temperature: format_mean(summary.mean_temperature),
        mean_humidity: format_mean(summary.mean_humidity),
        temperatures: values(DryerReading::temperatures),
        humidities: values(DryerReading::humidities),
        battery: format_value(summary.battery),
        battery_status: summary.battery_bucket.map_or(NO_DATA, |b| b.label()),
    }
}

/// JSON that cannot close the surrounding `<script>` element.
fn script_safe_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
