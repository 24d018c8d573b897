//! HTML pages.

use crate::validation::ValidationErrors;

use super::views::Dashboard;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f5f3ff; color: #111827; }
nav { display: flex; justify-content: space-between; align-items: center; background: #7c3aed; color: #fff; padding: .75rem 1.5rem; }
nav form { margin: 0; }
main { max-width: 72rem; margin: 0 auto; padding: 1.5rem; }
.card { background: #fff; border: 1px solid #ddd6fe; border-radius: .75rem; padding: 1rem 1.25rem; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(16rem, 1fr)); gap: 1rem; margin-bottom: 1.5rem; }
.big { font-size: 2rem; font-weight: 700; color: #7c3aed; }
.auth { max-width: 24rem; margin: 4rem auto; }
.auth label { display: block; margin-top: .75rem; }
.auth input { width: 100%; padding: .5rem; box-sizing: border-box; }
.field-error, .error { color: #b91c1c; }
.notice { color: #047857; }
.controls { display: flex; flex-wrap: wrap; gap: .5rem; align-items: end; margin-bottom: 1rem; }
table { width: 100%; border-collapse: collapse; background: #fff; font-size: .875rem; }
th, td { border-bottom: 1px solid #e5e7eb; padding: .4rem .5rem; text-align: left; }
th a { color: inherit; }
.pager { display: flex; gap: 1rem; align-items: center; margin-top: 1rem; }
.disabled { color: #9ca3af; }
canvas { width: 100%; max-height: 300px; }
"#;

const CHART_SCRIPT: &str = r#"
const points = JSON.parse(document.getElementById('series').textContent);
const labels = points.map(p => new Date(p.at).toLocaleString());
const line = (label, key, color) => ({ label, data: points.map(p => p[key]), borderColor: color, spanGaps: true });
const draw = (id, datasets) => new Chart(document.getElementById(id), {
  type: 'line', data: { labels, datasets }, options: { scales: { y: { min: 0, max: 100 } } }
});
draw('temperature-chart', [
  line('Inlet', 'inlet_temperature', '#22c55e'), line('Chamber 1', 'chamber1_temperature', '#f97316'),
  line('Chamber 2', 'chamber2_temperature', '#3b82f6'), line('Outlet', 'outlet_temperature', '#ef4444'),
]);
draw('humidity-chart', [
  line('Inlet', 'inlet_humidity', '#22c55e'), line('Chamber 1', 'chamber1_humidity', '#f97316'),
  line('Chamber 2', 'chamber2_humidity', '#3b82f6'), line('Outlet', 'outlet_humidity', '#ef4444'),
]);
draw('battery-chart', [line('Battery', 'battery', '#8b5cf6')]);
"#;

markup::define! {
    Layout<'a, Body: markup::Render>(title: &'a str, admin_name: Option<&'a str>, body: Body) {
        @markup::doctype()
        html[lang = "en"] {
            head {
                meta[charset = "utf-8"];
                meta[name = "viewport", content = "width=device-width, initial-scale=1"];
                title { @title " · Dryer Dashboard" }
                style { @markup::raw(STYLE) }
            }
            body {
                nav {
                    strong { "Dryer Dashboard" }
                    @if let Some(name) = admin_name {
                        form[method = "post", action = "/logout"] {
                            span { @name " " }
                            button[type = "submit"] { "Sign out" }
                        }
                    }
                }
                main { @body }
            }
        }
    }

    Loading {
        p { "Loading..." }
        script { @markup::raw("setTimeout(() => window.location.reload(), 1000);") }
    }

    FetchFailed {
        div.card {
            h2 { "Could not load dryer data" }
            p { "The readings could not be fetched from the database." }
            a[href = ""] { "Reload" }
        }
    }

    LoginPage<'a>(email: &'a str, errors: &'a ValidationErrors, error: Option<&'a str>, notice: Option<&'a str>) {
        div."card auth" {
            h1 { "Sign in" }
            @if let Some(notice) = notice {
                p.notice { @notice }
            }
            @if let Some(error) = error {
                p.error { @error }
            }
            form[method = "post", action = "/login", novalidate = true] {
                label[for = "email"] { "Email" }
                input[id = "email", type = "email", name = "email", value = email, autocomplete = "email"];
                @if let Some(message) = errors.get("email") {
                    p."field-error" { @message }
                }
                label[for = "password"] { "Password" }
                input[id = "password", type = "password", name = "password", autocomplete = "current-password"];
                @if let Some(message) = errors.get("password") {
                    p."field-error" { @message }
                }
                p { button[type = "submit"] { "Sign in" } }
            }
            p { "No account yet? " a[href = "/register"] { "Create one" } }
        }
    }

    RegisterPage<'a>(full_name: &'a str, email: &'a str, errors: &'a ValidationErrors, error: Option<&'a str>) {
        div."card auth" {
            h1 { "Create account" }
            @if let Some(error) = error {
                p.error { @error }
            }
            form[method = "post", action = "/register", novalidate = true] {
                label[for = "full_name"] { "Full name (optional)" }
                input[id = "full_name", type = "text", name = "full_name", value = full_name, autocomplete = "name"];
                label[for = "email"] { "Email" }
                input[id = "email", type = "email", name = "email", value = email, autocomplete = "email"];
                @if let Some(message) = errors.get("email") {
                    p."field-error" { @message }
                }
                label[for = "password"] { "Password" }
                input[id = "password", type = "password", name = "password", autocomplete = "new-password"];
                @if let Some(message) = errors.get("password") {
                    p."field-error" { @message }
                }
                label[for = "confirm_password"] { "Confirm password" }
                input[id = "confirm_password", type = "password", name = "confirm_password", autocomplete = "new-password"];
                @if let Some(message) = errors.get("confirm_password") {
                    p."field-error" { @message }
                }
                p { button[type = "submit"] { "Create account" } }
            }
            p { "Already registered? " a[href = "/login"] { "Sign in" } }
        }
    }

    DashboardBody<'a>(dash: &'a Dashboard) {
        section.cards {
            div.card {
                h3 { "Temperature" }
                p.big { @dash.cards.mean_temperature }
                p { "Average over " @dash.cards.range }
                p {
                    "Inlet " @dash.cards.temperatures[0] " · "
                    "Chamber " @dash.cards.temperatures[1] " / " @dash.cards.temperatures[2] " · "
                    "Outlet " @dash.cards.temperatures[3]
                }
            }
            div.card {
                h3 { "Relative Humidity" }
                p.big { @dash.cards.mean_humidity }
                p { "Average over " @dash.cards.range }
                p {
                    "Inlet " @dash.cards.humidities[0] " · "
                    "Chamber " @dash.cards.humidities[1] " / " @dash.cards.humidities[2] " · "
                    "Outlet " @dash.cards.humidities[3]
                }
            }
            div.card {
                h3 { "Status and condition" }
                p { "Battery: " strong { @dash.cards.battery } " (" @dash.cards.battery_status ")" }
                p { "Readings: " @dash.cards.count }
                p { "Last update: " @dash.cards.latest_at }
            }
        }

        section {
            div.card { h3 { "Temperature vs Time" } canvas[id = "temperature-chart"] {} }
            div.card { h3 { "Humidity vs Time" } canvas[id = "humidity-chart"] {} }
            div.card { h3 { "Battery Level vs Time" } canvas[id = "battery-chart"] {} }
        }

        section {
            h2 { "Readings" }
            form.controls[method = "get", action = "/dashboard"] {
                input[type = "hidden", name = "sort", value = dash.filters.sort];
                input[type = "hidden", name = "order", value = dash.filters.order];
                label {
                    "Search "
                    input[type = "search", name = "search", value = &dash.filters.search];
                }
                label {
                    "Type "
                    select[name = "type"] {
                        @for choice in dash.filters.types.iter() {
                            option[value = &choice.value, selected = choice.selected] { @choice.label }
                        }
                    }
                }
                label {
                    "Battery "
                    select[name = "battery"] {
                        @for choice in dash.filters.battery.iter() {
                            option[value = &choice.value, selected = choice.selected] { @choice.label }
                        }
                    }
                }
                label {
                    "Time range "
                    select[name = "range"] {
                        @for choice in dash.filters.ranges.iter() {
                            option[value = &choice.value, selected = choice.selected] { @choice.label }
                        }
                    }
                }
                label {
                    "Rows "
                    select[name = "per_page"] {
                        @for choice in dash.filters.page_sizes.iter() {
                            option[value = &choice.value, selected = choice.selected] { @choice.label }
                        }
                    }
                }
                button[type = "submit"] { "Apply" }
                a[href = &dash.csv_href] { "Export CSV" }
                " "
                a[href = &dash.print_href, target = "_blank"] { "Export PDF" }
            }

            table {
                thead {
                    tr {
                        @for header in dash.table.headers.iter() {
                            th {
                                @if let Some(href) = &header.href {
                                    a[href = href] { @header.label @header.indicator }
                                } else {
                                    @header.label
                                }
                            }
                        }
                    }
                }
                tbody {
                    @for row in dash.table.rows.iter() {
                        tr {
                            @for cell in row.iter() {
                                td { @cell }
                            }
                        }
                    }
                    @if dash.table.rows.is_empty() {
                        tr { td[colspan = 13] { "No readings match the current filters." } }
                    }
                }
            }

            div.pager {
                @if let Some(href) = &dash.table.pager.previous {
                    a[href = href] { "Previous" }
                } else {
                    span.disabled { "Previous" }
                }
                span {
                    "Page " @dash.table.pager.number " of " @dash.table.pager.total_pages
                    " (" @dash.table.pager.first_item "-" @dash.table.pager.last_item
                    " of " @dash.table.pager.total_items ")"
                }
                @if let Some(href) = &dash.table.pager.next {
                    a[href = href] { "Next" }
                } else {
                    span.disabled { "Next" }
                }
            }
        }

        script[id = "series", type = "application/json"] { @markup::raw(&dash.series_json) }
        script[src = "https://cdn.jsdelivr.net/npm/chart.js@4"] {}
        script { @markup::raw(CHART_SCRIPT) }
    }
}
