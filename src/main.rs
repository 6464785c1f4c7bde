use crate::cli::{Cli, Commands, write_completions};
use crate::export::save_screening_csv;
use crate::progress::{ProgressState, Stage, track};
use crate::report::{HtmlReportContext, save_html_report};
use crate::summary::{SummaryContext, SummaryPaths, print_chart_summary, print_summary};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};
use clap::Parser;
use reqwest::Client;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stock_screen::error::FetchError;
use stock_screen::model::View;
use stock_screen::series::{PreparedSeries, prepare_series};
use stock_screen::sources::{
    ApiClient, ScreeningBatch, ScreeningFilters, fetch_price_volume_1y, fetch_view,
};
use stock_screen::state::{DashboardState, Resource, Selection};
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod export;
mod formatting;
mod progress;
mod report;
mod summary;
mod table;

const USER_AGENT: &str = concat!("stock-screen/", env!("CARGO_PKG_VERSION"));
const DEFAULT_LOG_FILTER: &str = "warn";

#[tokio::main]
async fn main() -> Result<()> {
    colored::control::set_override(true);
    init_logging()?;

    let mut cli = Cli::parse();
    match cli.command.take() {
        Some(Commands::Completions { shell, output_dir }) => {
            write_completions(shell, output_dir.as_deref())
        }
        Some(Commands::Screen { view, chart }) => run_screen(&cli, view.into(), chart).await,
        Some(Commands::Chart { ts_code }) => run_chart(&cli, &ts_code).await,
        Some(Commands::Dashboard) | None => run_dashboard(&cli).await,
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("invalid RUST_LOG filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))
}

fn build_api(cli: &Cli) -> Result<ApiClient> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(cli.timeout))
        .build()
        .context("failed to build HTTP client")?;
    Ok(ApiClient::new(client, cli.base_url.as_str(), cli.retries))
}

fn progress_for(cli: &Cli) -> ProgressState {
    ProgressState::new(!cli.no_progress)
}

async fn load_view(
    api: &ApiClient,
    progress: &ProgressState,
    view: View,
    filters: &ScreeningFilters,
) -> Result<ScreeningBatch, FetchError> {
    track(progress, Stage::Screen, view.title(), fetch_view(api, view, filters)).await
}

async fn load_series(api: &ApiClient, ts_code: &str) -> Result<PreparedSeries, FetchError> {
    let response = fetch_price_volume_1y(api, ts_code).await?;
    Ok(prepare_series(&response.data))
}

async fn run_dashboard(cli: &Cli) -> Result<()> {
    let run_started_at = Local::now();
    let api = build_api(cli)?;
    let progress = progress_for(cli);
    let filters = cli.filters.to_filters();
    let mut state = DashboardState::new();

    let tokens = View::ALL.map(|view| (view, state.begin_view(view)));
    let (undervalued, weekly, reversal, etf, portfolio) = tokio::join!(
        load_view(&api, &progress, View::Undervalued, &filters),
        load_view(&api, &progress, View::WeeklyVolumeSurge, &filters),
        load_view(&api, &progress, View::BottomReversal, &filters),
        load_view(&api, &progress, View::EtfVolumeSurge, &filters),
        load_view(&api, &progress, View::SmartPortfolio, &filters),
    );
    let results = [undervalued, weekly, reversal, etf, portfolio];
    for ((view, token), result) in tokens.into_iter().zip(results) {
        state.complete_view(view, token, result);
    }

    load_top_charts(&api, &progress, &mut state, cli.charts).await?;
    progress.clear();

    finish_run(cli, &api, &state, &run_started_at).await
}

/// Load chart series for the top `per_view` rows of every ready view,
/// fetching each instrument once.
async fn load_top_charts(
    api: &ApiClient,
    progress: &ProgressState,
    state: &mut DashboardState,
    per_view: usize,
) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut picks = Vec::new();
    for (_, view) in state.views() {
        if let Resource::Ready(ranked) = view.list.resource() {
            for derived in ranked.records.iter().take(per_view) {
                let record = &derived.record;
                if seen.insert(record.ts_code().to_string()) {
                    picks.push(Selection {
                        ts_code: record.ts_code().to_string(),
                        name: record.name().to_string(),
                    });
                }
            }
        }
    }

    let mut tasks = JoinSet::new();
    for pick in picks {
        let token = state.begin_chart(&pick.ts_code);
        let bar = progress.begin(Stage::Charts, &format!("{} ({})", pick.name, pick.ts_code));
        let api = api.clone();
        tasks.spawn(async move {
            let result = load_series(&api, &pick.ts_code).await;
            bar.finish(&result);
            (pick.ts_code, token, result)
        });
    }

    let mut loaded = 0_usize;
    while let Some(joined) = tasks.join_next().await {
        let (code, token, result) = joined.context("chart task panicked")?;
        loaded += usize::from(result.is_ok());
        if !state.complete_chart(&code, token, result) {
            debug!(ts_code = %code, "chart response superseded");
        }
    }
    info!(loaded, "chart series loaded");
    Ok(())
}

async fn run_screen(cli: &Cli, view: View, chart: Option<usize>) -> Result<()> {
    let run_started_at = Local::now();
    let api = build_api(cli)?;
    let progress = progress_for(cli);
    let filters = cli.filters.to_filters();
    let mut state = DashboardState::new();

    let token = state.begin_view(view);
    let result = load_view(&api, &progress, view, &filters).await;
    state.complete_view(view, token, result);

    if let Some(position) = chart {
        let selection = select_position(&state, view, position)?;
        info!(ts_code = %selection.ts_code, position, "charting selection");
        let ts_code = selection.ts_code.clone();
        let subject = format!("{} ({ts_code})", selection.name);
        let token = state.select(view, selection);
        let result = track(&progress, Stage::Charts, &subject, load_series(&api, &ts_code)).await;
        state.complete_selection(view, token, result);
    }
    progress.clear();

    finish_run(cli, &api, &state, &run_started_at).await
}

fn select_position(state: &DashboardState, view: View, position: usize) -> Result<Selection> {
    let ranked = state
        .view(view)
        .and_then(|view_state| view_state.list.resource().ready())
        .ok_or_else(|| anyhow!("{view} did not load; nothing to chart"))?;
    if position == 0 || position > ranked.len() {
        bail!(
            "position {position} is out of range; {view} has {} rows",
            ranked.len()
        );
    }
    let record = &ranked.records[position - 1].record;
    Ok(Selection {
        ts_code: record.ts_code().to_string(),
        name: record.name().to_string(),
    })
}

async fn run_chart(cli: &Cli, ts_code: &str) -> Result<()> {
    let api = build_api(cli)?;
    let progress = progress_for(cli);
    let mut state = DashboardState::new();

    let token = state.begin_chart(ts_code);
    let result = track(&progress, Stage::Charts, ts_code, load_series(&api, ts_code)).await;
    state.complete_chart(ts_code, token, result);
    progress.clear();

    let resource = state
        .chart(ts_code)
        .ok_or_else(|| anyhow!("no chart state for {ts_code}"))?;
    println!();
    print_chart_summary(ts_code, ts_code, resource);
    Ok(())
}

async fn finish_run(
    cli: &Cli,
    api: &ApiClient,
    state: &DashboardState,
    run_started_at: &DateTime<Local>,
) -> Result<()> {
    let csv_path: Option<PathBuf> = match cli.save_csv.as_deref() {
        Some(path) => Some(save_screening_csv(path, state, cli.archive_csv).await?),
        None => None,
    };

    if let Some(path) = cli.save_html.as_deref() {
        let context = HtmlReportContext {
            base_url: api.base_url(),
            run_started_at,
            state,
            full_output: cli.full_output,
            charts_per_view: cli.charts,
            csv_path: csv_path.as_deref(),
            output_path: path,
        };
        save_html_report(path, &context).await?;
        info!(path = %path.display(), "saved html dashboard");
    }

    print_summary(&SummaryContext {
        base_url: api.base_url(),
        run_started_at,
        paths: SummaryPaths {
            csv: csv_path.as_deref(),
            html: cli.save_html.as_deref(),
        },
        state,
        full_output: cli.full_output,
    });
    Ok(())
}

pub(crate) async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}
