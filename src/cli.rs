use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate, generate_to};
use stock_screen::model::View;
use stock_screen::sources::screening::{
    DEFAULT_LOOKBACK_WEEKS, DEFAULT_MAX_PE, DEFAULT_MIN_AMOUNT, DEFAULT_MIN_MV, DEFAULT_MIN_RATIO,
    DEFAULT_PORTFOLIO_LIMIT,
};
use stock_screen::sources::{
    DEFAULT_MAX_ATTEMPTS, EtfSurgeFilter, ScreeningFilters, UndervaluedFilter,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_CHARTS: usize = 3;
pub const DEFAULT_CSV_PATH: &str = "data/output/screening.csv";
pub const DEFAULT_HTML_PATH: &str = "data/output/dashboard.html";

pub const SAVE_CSV_HELP: &str = "Save the ranked screening records to the given CSV file (defaults to data/output/screening.csv when no path is provided). Use --archive-csv to store a .gz instead.";
pub const SAVE_HTML_HELP: &str = "Save the HTML dashboard to the given file (defaults to data/output/dashboard.html when no path is provided).";
pub const ARCHIVE_CSV_HELP: &str = "Archive saved CSV outputs into .gz files.";
pub const CHARTS_HELP: &str = "Number of top-ranked instruments per view to load one-year price/volume charts for (0 disables charts).";

#[derive(Debug, Parser)]
#[command(
    name = "stock-screen",
    about = "Fetch stock screening results, rank them by deviation from their reference price, and chart one year of price and volume.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[arg(
        long,
        env = "STOCK_SCREEN_API_URL",
        default_value = DEFAULT_BASE_URL,
        help = "Base URL of the screening API."
    )]
    pub base_url: String,
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECONDS,
        help = "HTTP request timeout."
    )]
    pub timeout: u64,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        help = "Attempts per request, retrying only transport failures, 5xx and 429 responses."
    )]
    pub retries: usize,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_PATH,
        help = SAVE_CSV_HELP
    )]
    pub save_csv: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HTML_PATH,
        help = SAVE_HTML_HELP
    )]
    pub save_html: Option<PathBuf>,
    #[arg(long, help = ARCHIVE_CSV_HELP)]
    pub archive_csv: bool,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHARTS, help = CHARTS_HELP)]
    pub charts: usize,
    #[arg(
        long,
        help = "Print every ranked row instead of the top ten per view."
    )]
    pub full_output: bool,
    #[arg(long, help = "Disable progress spinner output.")]
    pub no_progress: bool,
    #[command(flatten)]
    pub filters: FilterArgs,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Strategy parameters forwarded to the screening endpoints.
#[derive(Debug, Clone, clap::Args)]
pub struct FilterArgs {
    #[arg(
        long,
        value_name = "MV_10K",
        default_value_t = DEFAULT_MIN_MV,
        help = "Undervalued: minimum market value in units of 10k."
    )]
    pub min_mv: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PE,
        help = "Undervalued: maximum trailing PE."
    )]
    pub max_pe: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_MIN_RATIO,
        help = "ETF surge: minimum last-week volume over the lookback maximum."
    )]
    pub min_ratio: f64,
    #[arg(
        long,
        value_name = "WEEKS",
        default_value_t = DEFAULT_LOOKBACK_WEEKS,
        help = "ETF surge: number of prior weeks compared against."
    )]
    pub lookback_weeks: u32,
    #[arg(
        long,
        value_name = "AMOUNT_100M",
        default_value_t = DEFAULT_MIN_AMOUNT,
        help = "ETF surge: minimum last-week traded amount in hundred-millions."
    )]
    pub min_amount: f64,
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_PORTFOLIO_LIMIT,
        help = "Smart portfolio: maximum picks per strategy."
    )]
    pub portfolio_limit: u32,
}

impl FilterArgs {
    pub const fn to_filters(&self) -> ScreeningFilters {
        ScreeningFilters {
            undervalued: UndervaluedFilter {
                min_mv: self.min_mv,
                max_pe: self.max_pe,
            },
            etf: EtfSurgeFilter {
                min_ratio: self.min_ratio,
                lookback_weeks: self.lookback_weeks,
                min_amount: self.min_amount,
            },
            portfolio_limit: self.portfolio_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Undervalued,
    WeeklyVolumeSurge,
    BottomReversal,
    EtfVolumeSurge,
    SmartPortfolio,
}

impl From<ViewArg> for View {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Undervalued => Self::Undervalued,
            ViewArg::WeeklyVolumeSurge => Self::WeeklyVolumeSurge,
            ViewArg::BottomReversal => Self::BottomReversal,
            ViewArg::EtfVolumeSurge => Self::EtfVolumeSurge,
            ViewArg::SmartPortfolio => Self::SmartPortfolio,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load every screening view concurrently and chart the top picks (default).
    Dashboard,
    /// Load a single screening view, optionally charting one of its rows.
    Screen {
        #[arg(value_enum, help = "Screening view to load.")]
        view: ViewArg,
        #[arg(
            long,
            value_name = "POS",
            help = "Chart the instrument at this ranked position (1-based)."
        )]
        chart: Option<usize>,
    },
    /// Fetch and summarize one year of price/volume data for an instrument.
    Chart {
        #[arg(help = "Instrument code, e.g. 600519.SH.")]
        ts_code: String,
    },
    /// Print a shell completion script, or write it into a directory.
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for.")]
        shell: Shell,
        #[arg(
            long,
            value_name = "DIR",
            help = "Write the script into DIR (e.g. ~/.local/share/bash-completion/completions) instead of stdout."
        )]
        output_dir: Option<PathBuf>,
    },
}

const BIN_NAME: &str = "stock-screen";

pub fn write_completions(shell: Shell, output_dir: Option<&Path>) -> Result<()> {
    let Some(dir) = output_dir else {
        let mut stdout = io::stdout().lock();
        render_completions(shell, &mut stdout);
        return stdout.flush().context("failed to flush completion script");
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = generate_to(shell, &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("failed to write {shell} completions into {}", dir.display()))?;
    println!("Wrote {shell} completions to {}", path.display());
    Ok(())
}

fn render_completions(shell: Shell, out: &mut dyn Write) {
    generate(shell, &mut Cli::command(), BIN_NAME, out);
}
