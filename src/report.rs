use crate::table::{cells, columns};
use crate::write_output_file;
use anyhow::Result;
use chrono::{DateTime, Local};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use minify_html::{Cfg, minify};
use std::fmt::Write as _;
use std::path::Path;
use stock_screen::error::describe_error;
use stock_screen::model::View;
use stock_screen::series::{PreparedSeries, format_amount};
use stock_screen::state::{DashboardState, RankedView, Resource, ViewState};

const CHART_WIDTH: f64 = 720.0;
const PRICE_PANEL_HEIGHT: f64 = 210.0;
const VOLUME_PANEL_HEIGHT: f64 = 150.0;
const PANEL_GAP: f64 = 16.0;
const COMPACT_ROWS: usize = 10;

pub struct HtmlReportContext<'a> {
    pub(crate) base_url: &'a str,
    pub(crate) run_started_at: &'a DateTime<Local>,
    pub(crate) state: &'a DashboardState,
    pub(crate) full_output: bool,
    pub(crate) charts_per_view: usize,
    pub(crate) csv_path: Option<&'a Path>,
    pub(crate) output_path: &'a Path,
}

pub async fn save_html_report(output_path: &Path, context: &HtmlReportContext<'_>) -> Result<()> {
    let markup = render_html_report(context);
    let minified = minify(markup.into_string().as_bytes(), &Cfg::new());
    write_output_file(output_path, &minified).await
}

fn render_html_report(context: &HtmlReportContext<'_>) -> Markup {
    let generated_at = context
        .run_started_at
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    let title = format!(
        "Stock Screen - {}",
        context.run_started_at.format("%Y-%m-%d")
    );

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(REPORT_STYLE)) }
            }
            body {
                div.page {
                    header.hero {
                        div.pill { "Stock Screen v" (env!("CARGO_PKG_VERSION")) }
                        h1 { "Screening Dashboard" }
                        p.subtitle {
                            "Screening results ranked by deviation from their reference average, with one-year price and volume charts."
                        }
                        div.meta {
                            div { span.label { "Generated" } span.value.mono { (generated_at) } }
                            div { span.label { "Data source" } span.value.mono { (context.base_url) } }
                        }
                    }
                    nav.tabs {
                        @for (view, _) in context.state.views() {
                            a.tab href={ "#" (view.slug()) } { (view.title()) }
                        }
                    }
                    section.cards {
                        @for (view, state) in context.state.views() {
                            div.card {
                                div.card-label { (view.title()) }
                                div.card-value { (card_value(state.list.resource())) }
                            }
                        }
                    }
                    @for (view, state) in context.state.views() {
                        (render_view_section(view, state, context))
                    }
                    (render_downloads(context))
                    footer.footer { "Prices in currency units; amounts in hundred-millions." }
                }
                script { (PreEscaped(SORT_SCRIPT)) }
            }
        }
    }
}

fn card_value(resource: &Resource<RankedView>) -> String {
    match resource {
        Resource::Ready(ranked) => ranked.len().to_string(),
        Resource::Failed(_) => "failed".to_string(),
        Resource::Idle | Resource::Loading => "-".to_string(),
    }
}

fn render_view_section(
    view: View,
    state: &ViewState<RankedView>,
    context: &HtmlReportContext<'_>,
) -> Markup {
    let resource = state.list.resource();
    html! {
        section.table-section id=(view.slug()) {
            div.section-header {
                h2 { (view.title()) }
                @if let Resource::Ready(ranked) = resource {
                    @if let Some(label) = ranked.diversification.as_deref() {
                        span.tag { (label) }
                    }
                    @if !context.full_output && ranked.len() > COMPACT_ROWS {
                        div.hint { "Showing top " (COMPACT_ROWS) " of " (ranked.len()) ". Run with --full-output to include the full table." }
                    }
                }
            }
            @match resource {
                Resource::Ready(ranked) => {
                    (render_table(ranked, context.full_output))
                    (render_charts(ranked, context))
                    @if let Some(selection) = state.selected.as_ref() {
                        @let reference = ranked
                            .records
                            .iter()
                            .find(|derived| derived.record.ts_code() == selection.ts_code)
                            .and_then(|derived| derived.record.reference_price());
                        div.charts {
                            (render_chart(&selection.ts_code, &selection.name, reference, state.chart.resource()))
                        }
                    }
                }
                Resource::Failed(error) => {
                    div.error {
                        h3 { "Data fetch failed" }
                        p.mono { (describe_error(error)) }
                        p.muted { "Re-run stock-screen to retry." }
                    }
                }
                Resource::Idle | Resource::Loading => {
                    p.muted { "No data loaded." }
                }
            }
        }
    }
}

fn render_table(ranked: &RankedView, full_output: bool) -> Markup {
    let columns = columns(ranked.view);
    let limit = if full_output {
        ranked.len()
    } else {
        COMPACT_ROWS
    };
    html! {
        @if ranked.is_empty() {
            p.muted { "No matching instruments." }
        } @else {
            div.table-wrap {
                table.sortable {
                    thead {
                        tr {
                            @for column in columns {
                                th data-numeric=(if column.numeric { "true" } else { "false" }) { (column.title) }
                            }
                        }
                    }
                    tbody {
                        @for (idx, derived) in ranked.records.iter().take(limit).enumerate() {
                            tr {
                                @for (column, cell) in columns.iter().zip(cells(idx + 1, derived)) {
                                    td class=(cell_class(column.numeric, cell.class)) { (cell.text) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn cell_class(numeric: bool, extra: &str) -> String {
    match (numeric, extra.is_empty()) {
        (true, true) => "num".to_string(),
        (true, false) => format!("num {extra}"),
        (false, _) => extra.to_string(),
    }
}

fn render_charts(ranked: &RankedView, context: &HtmlReportContext<'_>) -> Markup {
    html! {
        @if context.charts_per_view > 0 && !ranked.is_empty() {
            div.charts {
                @for derived in ranked.records.iter().take(context.charts_per_view) {
                    @let code = derived.record.ts_code();
                    @if let Some(resource) = context.state.chart(code) {
                        (render_chart(code, derived.record.name(), derived.record.reference_price(), resource))
                    }
                }
            }
        }
    }
}

fn render_chart(
    ts_code: &str,
    name: &str,
    reference: Option<f64>,
    resource: &Resource<PreparedSeries>,
) -> Markup {
    html! {
        div.chart-card {
            h3 { (name) " (" (ts_code) ") - one year price & volume" }
            @match resource {
                Resource::Ready(series) => {
                    @if series.price_domain.is_some() {
                        (PreEscaped(render_chart_svg(series, reference)))
                    } @else {
                        p.muted { "No observations in the last year." }
                    }
                }
                Resource::Failed(error) => {
                    p.error-text { "Price/volume fetch failed: " (describe_error(error)) }
                }
                Resource::Idle | Resource::Loading => {
                    p.muted { "No price data loaded." }
                }
            }
        }
    }
}

fn x_position(idx: usize, len: usize) -> f64 {
    if len <= 1 {
        return CHART_WIDTH / 2.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = idx as f64 / (len - 1) as f64;
    ratio * CHART_WIDTH
}

/// Price line on top, volume bars below; each point carries a hover title
/// with its traded amount converted to hundred-millions. A reference price
/// inside the plotted domain is drawn as a dashed line.
fn render_chart_svg(series: &PreparedSeries, reference: Option<f64>) -> String {
    let Some(domain) = series.price_domain else {
        return String::new();
    };
    let len = series.ordered.len();
    let volume_max = series.volume_max().unwrap_or(0.0);
    #[allow(clippy::cast_precision_loss)]
    let bar_width = (CHART_WIDTH / len.max(1) as f64 * 0.7).clamp(1.0, 14.0);
    let total_height = PRICE_PANEL_HEIGHT + PANEL_GAP + VOLUME_PANEL_HEIGHT;
    let volume_top = PRICE_PANEL_HEIGHT + PANEL_GAP;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="chart" viewBox="0 0 {CHART_WIDTH} {total_height}" preserveAspectRatio="none" role="img">"#
    );
    let _ = write!(
        svg,
        r#"<text class="axis" x="4" y="12">{:.2}</text><text class="axis" x="4" y="{:.0}">{:.2}</text>"#,
        domain.high,
        PRICE_PANEL_HEIGHT - 4.0,
        domain.low
    );

    let mut path = String::new();
    for (idx, point) in series.ordered.iter().enumerate() {
        let x = x_position(idx, len);
        let y = domain.project(point.close, PRICE_PANEL_HEIGHT);
        let _ = write!(path, "{}{x:.1},{y:.1}", if idx == 0 { "" } else { " " });
    }
    if let Some(reference) = reference.filter(|price| domain.contains(*price)) {
        let y = domain.project(reference, PRICE_PANEL_HEIGHT);
        let _ = write!(
            svg,
            r#"<line class="reference" x1="0" y1="{y:.1}" x2="{CHART_WIDTH}" y2="{y:.1}"><title>1y average {reference:.2}</title></line>"#
        );
    }
    let _ = write!(svg, r#"<polyline class="price" points="{path}"/>"#);

    for (idx, point) in series.ordered.iter().enumerate() {
        let x = x_position(idx, len);
        let ratio = if volume_max > 0.0 {
            (point.vol / volume_max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let height = ratio * VOLUME_PANEL_HEIGHT;
        let _ = write!(
            svg,
            r#"<rect class="volume" x="{:.1}" y="{:.1}" width="{bar_width:.1}" height="{height:.1}"><title>{} close {:.2} vol {:.0} amount {} (100M)</title></rect>"#,
            x - bar_width / 2.0,
            volume_top + VOLUME_PANEL_HEIGHT - height,
            point.trade_date,
            point.close,
            point.vol,
            format_amount(point.amount)
        );
    }

    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        let _ = write!(
            svg,
            r#"<text class="axis" x="4" y="{:.0}">{}</text><text class="axis end" x="{:.0}" y="{:.0}">{}</text>"#,
            total_height - 2.0,
            first.format("%m-%d"),
            CHART_WIDTH - 4.0,
            total_height - 2.0,
            last.format("%m-%d")
        );
    }
    svg.push_str("</svg>");
    svg
}

fn render_downloads(context: &HtmlReportContext<'_>) -> Markup {
    html! {
        section.downloads {
            h3 { "Downloads" }
            @match context.csv_path {
                Some(path) => {
                    @let full_display = path.to_string_lossy();
                    @let display_name = path.file_name().and_then(|name| name.to_str()).unwrap_or(&full_display);
                    @if let Some(rel) = relative_link(context.output_path, path) {
                        a.download-link href=(rel) title=(full_display) { (display_name) }
                    } @else {
                        span.download-path title=(full_display) { (display_name) }
                    }
                }
                None => {
                    p.muted { "No CSV was saved. Use --save-csv." }
                }
            }
        }
    }
}

fn relative_link(html_path: &Path, target: &Path) -> Option<String> {
    let html_dir = html_path.parent()?;
    let target_dir = target.parent()?;
    if html_dir == target_dir {
        target
            .file_name()
            .and_then(|name| name.to_str())
            .map(std::string::ToString::to_string)
    } else {
        None
    }
}

const SORT_SCRIPT: &str = r"
document.querySelectorAll('table.sortable').forEach(function (table) {
  table.querySelectorAll('th').forEach(function (th, col) {
    th.addEventListener('click', function () {
      var body = table.tBodies[0];
      var numeric = th.dataset.numeric === 'true';
      var asc = th.dataset.order !== 'asc';
      th.dataset.order = asc ? 'asc' : 'desc';
      var rows = Array.prototype.slice.call(body.rows);
      rows.sort(function (a, b) {
        var x = a.cells[col].textContent, y = b.cells[col].textContent;
        var cmp = numeric ? (parseFloat(x) || 0) - (parseFloat(y) || 0) : x.localeCompare(y);
        return asc ? cmp : -cmp;
      });
      rows.forEach(function (row) { body.appendChild(row); });
    });
  });
});
";

const REPORT_STYLE: &str = r#"
:root {
  --bg: #f6f3ec;
  --ink: #1f1b16;
  --muted: #6b635b;
  --card: #ffffff;
  --accent: #3d405b;
  --up: #2f6f54;
  --down: #b42318;
  --border: #e2d6c6;
  --shadow: 0 16px 40px rgba(34, 30, 24, 0.08);
}
* { box-sizing: border-box; }
body { margin: 0; font-family: "Segoe UI", sans-serif; color: var(--ink); background: var(--bg); }
.page { max-width: 1200px; margin: 0 auto; padding: 40px 24px 64px; }
.hero { background: var(--card); border: 1px solid var(--border); border-radius: 20px; padding: 28px 32px; box-shadow: var(--shadow); }
.pill { display: inline-block; padding: 4px 12px; border-radius: 999px; background: rgba(61, 64, 91, 0.12); color: var(--accent); font-size: 12px; font-weight: 600; text-transform: uppercase; letter-spacing: 0.08em; }
h1 { font-size: 2.4rem; margin: 12px 0 6px; }
.subtitle { color: var(--muted); margin: 0 0 16px; }
.meta { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 12px; }
.label { display: block; font-size: 12px; text-transform: uppercase; letter-spacing: 0.1em; color: var(--muted); }
.value { font-weight: 600; }
.mono { font-family: ui-monospace, "SFMono-Regular", monospace; }
.tabs { display: flex; flex-wrap: wrap; gap: 8px; margin: 24px 0 0; }
.tab { padding: 8px 14px; border-radius: 999px; border: 1px solid var(--border); background: var(--card); color: var(--accent); text-decoration: none; font-weight: 600; font-size: 13px; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 16px; margin: 24px 0; }
.card { background: var(--card); border-radius: 16px; padding: 16px 20px; border: 1px solid var(--border); box-shadow: var(--shadow); }
.card-label { font-size: 12px; text-transform: uppercase; letter-spacing: 0.1em; color: var(--muted); margin-bottom: 6px; }
.card-value { font-size: 26px; font-weight: 600; color: var(--accent); }
.table-section { margin: 36px 0 24px; }
.section-header { display: flex; align-items: baseline; gap: 16px; flex-wrap: wrap; margin-bottom: 12px; }
.section-header h2 { margin: 0; }
.tag { padding: 2px 10px; border-radius: 999px; background: rgba(61, 64, 91, 0.12); font-size: 12px; }
.hint, .muted { color: var(--muted); font-size: 13px; }
.table-wrap { border-radius: 16px; overflow: auto; border: 1px solid var(--border); background: var(--card); box-shadow: var(--shadow); }
table { width: 100%; border-collapse: collapse; min-width: 860px; }
thead th { position: sticky; top: 0; background: var(--accent); color: #f8fafc; text-align: left; font-size: 12px; text-transform: uppercase; letter-spacing: 0.06em; padding: 12px 14px; cursor: pointer; }
tbody td { padding: 10px 14px; border-bottom: 1px solid rgba(226, 214, 198, 0.6); font-size: 14px; }
tbody tr:nth-child(even) { background: rgba(246, 243, 236, 0.6); }
.num { text-align: right; font-variant-numeric: tabular-nums; font-family: ui-monospace, "SFMono-Regular", monospace; }
.up { color: var(--up); }
.down { color: var(--down); }
.error { background: #fff4f2; border: 1px solid #f3c3bb; border-radius: 16px; padding: 16px 20px; }
.error h3, .error-text { color: var(--down); }
.charts { display: grid; grid-template-columns: repeat(auto-fit, minmax(480px, 1fr)); gap: 16px; margin-top: 16px; }
.chart-card { background: var(--card); border: 1px solid var(--border); border-radius: 16px; padding: 16px; box-shadow: var(--shadow); }
.chart-card h3 { margin: 0 0 8px; font-size: 15px; }
.chart { width: 100%; height: 300px; }
.chart .price { fill: none; stroke: #ef4444; stroke-width: 2; }
.chart .volume { fill: #60a5fa; }
.chart .reference { stroke: var(--muted); stroke-width: 1; stroke-dasharray: 6 4; }
.chart .axis { font-size: 11px; fill: var(--muted); }
.chart .axis.end { text-anchor: end; }
.downloads { background: var(--card); border: 1px solid var(--border); border-radius: 16px; padding: 18px 22px; box-shadow: var(--shadow); }
.downloads h3 { margin: 0 0 10px; }
.download-link, .download-path { color: var(--accent); font-weight: 600; word-break: break-all; }
.footer { margin-top: 28px; color: var(--muted); font-size: 13px; text-align: center; }
"#;
