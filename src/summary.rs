use crate::table::{cells, columns, format_line, separator};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::path::Path;
use stock_screen::error::describe_error;
use stock_screen::model::View;
use stock_screen::series::{PreparedSeries, format_amount};
use stock_screen::state::{DashboardState, RankedView, Resource};
use unicode_width::UnicodeWidthStr;

const COMPACT_ROWS: usize = 10;
const SPARK_TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 60;

pub struct SummaryPaths<'a> {
    pub(crate) csv: Option<&'a Path>,
    pub(crate) html: Option<&'a Path>,
}

pub struct SummaryContext<'a> {
    pub(crate) base_url: &'a str,
    pub(crate) run_started_at: &'a DateTime<Local>,
    pub(crate) paths: SummaryPaths<'a>,
    pub(crate) state: &'a DashboardState,
    pub(crate) full_output: bool,
}

pub fn print_summary(context: &SummaryContext<'_>) {
    println!();
    print_summary_header(context);
    print_summary_paths(&context.paths);

    let mut table_width = 0;
    for (view, state) in context.state.views() {
        println!();
        println!("{}", view.title().bold().bright_magenta());
        table_width = table_width.max(print_view(view, state.list.resource(), context.full_output));
        if let (Some(selection), resource) = (state.selected.as_ref(), state.chart.resource()) {
            println!();
            print_chart_summary(&selection.ts_code, &selection.name, resource);
        }
    }
    if table_width > 0 {
        println!("{}", "=".repeat(table_width).bright_cyan());
    }
}

fn print_summary_header(context: &SummaryContext<'_>) {
    println!(
        "{}",
        "===================== Stock Screen ======================"
            .bold()
            .bright_cyan()
    );
    println!(
        "{} {}",
        "Run started".bright_yellow().bold(),
        context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
            .bright_white()
    );
    println!(
        "{} {}",
        "Data source".bright_yellow().bold(),
        context.base_url.bright_white()
    );
    let counts: Vec<String> = context
        .state
        .views()
        .map(|(view, state)| match state.list.resource() {
            Resource::Ready(ranked) => format!("{}: {}", view.slug(), ranked.len()),
            Resource::Failed(_) => format!("{}: failed", view.slug()),
            Resource::Idle | Resource::Loading => format!("{}: -", view.slug()),
        })
        .collect();
    if !counts.is_empty() {
        println!(
            "{} {}",
            "Views".bright_yellow().bold(),
            counts.join(" | ").bright_white()
        );
    }
}

fn print_summary_paths(paths: &SummaryPaths<'_>) {
    print_path_line("CSV export", paths.csv, "not saved (use --save-csv)");
    print_path_line("HTML dashboard", paths.html, "not saved (use --save-html)");
}

fn print_path_line(label: &str, path: Option<&Path>, hint: &str) {
    let label_colored = label.bright_yellow().bold();
    match path {
        Some(path) => println!(
            "{} {}",
            label_colored,
            format!("{}", path.display()).bright_white()
        ),
        None => println!("{} {}", label_colored, hint.bright_black()),
    }
}

fn print_view(view: View, resource: &Resource<RankedView>, full_output: bool) -> usize {
    match resource {
        Resource::Ready(ranked) => print_ranked_table(ranked, full_output),
        Resource::Failed(error) => {
            let message = format!("Data fetch failed: {}", describe_error(error));
            println!("{}", message.bright_red());
            println!("{}", "Re-run the command to retry.".bright_black());
            message.width()
        }
        Resource::Idle | Resource::Loading => {
            let message = format!("{view}: no data loaded.");
            println!("{}", message.bright_black());
            message.width()
        }
    }
}

fn print_ranked_table(ranked: &RankedView, full_output: bool) -> usize {
    if let Some(label) = ranked.diversification.as_deref() {
        println!(
            "{} {}",
            "Diversification".bright_yellow().bold(),
            label.bright_white()
        );
    }
    if ranked.is_empty() {
        let message = "No matching instruments.";
        println!("{}", message.bright_black());
        return message.width();
    }

    let columns = columns(ranked.view);
    let titles: Vec<&str> = columns.iter().map(|column| column.title).collect();
    let header = format_line(columns, &titles);
    let divider = separator(columns);
    let mut max_width = header.width().max(divider.width());
    println!("{}", header.bold().bright_white());
    println!("{}", divider.bright_black());

    let limit = if full_output {
        ranked.len()
    } else {
        COMPACT_ROWS
    };
    for (idx, derived) in ranked.records.iter().take(limit).enumerate() {
        let row = cells(idx + 1, derived);
        let texts: Vec<&str> = row.iter().map(|cell| cell.text.as_str()).collect();
        let line = format_line(columns, &texts);
        max_width = max_width.max(line.width());
        if derived.is_below_reference() {
            println!("{}", line.bright_green());
        } else {
            println!("{}", line.bright_white());
        }
    }
    if ranked.len() > limit {
        let message = format!(
            "... {} more entries (use --full-output to display all).",
            ranked.len() - limit
        );
        max_width = max_width.max(message.width());
        println!("{}", message.bright_black());
    }
    max_width
}

pub fn print_chart_summary(ts_code: &str, name: &str, resource: &Resource<PreparedSeries>) {
    println!(
        "{} {}",
        "Chart".bold().bright_magenta(),
        format!("{name} ({ts_code})").bright_white()
    );
    let series = match resource {
        Resource::Ready(series) => series,
        Resource::Failed(error) => {
            println!(
                "{}",
                format!("Price/volume fetch failed: {}", describe_error(error)).bright_red()
            );
            return;
        }
        Resource::Idle | Resource::Loading => {
            println!("{}", "No price data loaded.".bright_black());
            return;
        }
    };

    let (Some(domain), Some(first), Some(last)) =
        (series.price_domain, series.ordered.first(), series.ordered.last())
    else {
        println!("{}", "No observations in the last year.".bright_black());
        return;
    };

    println!(
        "{} {} .. {} ({} sessions)",
        "Range".bright_yellow().bold(),
        first.trade_date,
        last.trade_date,
        series.ordered.len()
    );
    println!(
        "{} [{:.2}, {:.2}]",
        "Price axis".bright_yellow().bold(),
        domain.low,
        domain.high
    );
    println!(
        "{} close {:.2} | vol {:.0} | amount {} (100M)",
        "Last session".bright_yellow().bold(),
        last.close,
        last.vol,
        format_amount(last.amount)
    );
    println!("{}", sparkline(series).bright_cyan());
}

fn sparkline(series: &PreparedSeries) -> String {
    let Some(domain) = series.price_domain else {
        return String::new();
    };
    let points = &series.ordered;
    let step = points.len().div_ceil(SPARK_WIDTH).max(1);
    #[allow(clippy::cast_precision_loss)]
    let top = (SPARK_TICKS.len() - 1) as f64;
    points
        .iter()
        .step_by(step)
        .map(|point| {
            let ratio = ((point.close - domain.low) / domain.span()).clamp(0.0, 1.0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = (ratio * top).round() as usize;
            SPARK_TICKS[idx.min(SPARK_TICKS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stock_screen::model::ObservationPoint;
    use stock_screen::series::prepare_series;

    #[test]
    fn sparkline_spans_low_to_high() {
        let points: Vec<ObservationPoint> = (0..3)
            .map(|i| ObservationPoint {
                trade_date: NaiveDate::from_ymd_opt(2025, 1, 2 + i).unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 10.0 + f64::from(i) * 10.0,
                vol: 1.0,
                amount: 1.0,
            })
            .collect();
        let line = sparkline(&prepare_series(&points));
        assert_eq!(line.chars().count(), 3);
        assert!(line.starts_with('▁'));
        assert!(line.ends_with('█'));
    }
}
