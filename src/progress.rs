use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::time::Duration;
use stock_screen::error::FetchError;
use stock_screen::series::PreparedSeries;
use stock_screen::sources::ScreeningBatch;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan.bold} {msg}";
const SPINNER_TICKS: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";
const STAGE_COUNT: u8 = 2;

/// Pipeline phase a spinner belongs to: screening lists first, then charts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Screen,
    Charts,
}

impl Stage {
    const fn ordinal(self) -> u8 {
        match self {
            Self::Screen => 1,
            Self::Charts => 2,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Screen => "Screening",
            Self::Charts => "Charts",
        }
    }

    fn prefix(self, subject: &str) -> String {
        format!(
            "{} {} {}",
            format!("[{}/{STAGE_COUNT}]", self.ordinal()).bright_yellow().bold(),
            self.name().bright_cyan().bold(),
            subject.bright_white().bold()
        )
    }
}

/// Short description of a successful load, shown when its spinner stops.
pub trait Tally {
    fn tally(&self) -> String;
}

impl Tally for ScreeningBatch {
    fn tally(&self) -> String {
        if self.count == self.records.len() {
            format!("{} records", self.records.len())
        } else {
            format!("{} of {} records", self.records.len(), self.count)
        }
    }
}

impl Tally for PreparedSeries {
    fn tally(&self) -> String {
        match (self.ordered.len(), self.ordered.last()) {
            (0, _) | (_, None) => "no sessions".to_string(),
            (1, Some(last)) => format!("1 session, last close {:.2}", last.close),
            (sessions, Some(last)) => {
                format!("{sessions} sessions, last close {:.2}", last.close)
            }
        }
    }
}

fn outcome_text<T: Tally>(result: &Result<T, FetchError>) -> String {
    match result {
        Ok(value) => format!("{} ({})", "done".bright_green().bold(), value.tally()),
        Err(error) => format!("{} {}", "failed:".bright_red().bold(), error.kind()),
    }
}

/// Spinners on stderr; hidden entirely with `--no-progress`.
pub struct ProgressState {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl ProgressState {
    pub(crate) fn new(enabled: bool) -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(if enabled {
            ProgressDrawTarget::stderr_with_hz(15)
        } else {
            ProgressDrawTarget::hidden()
        });
        let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_TICKS);
        Self { multi, style }
    }

    /// Start a spinner for one view or instrument load.
    pub(crate) fn begin(&self, stage: Stage, subject: &str) -> StageBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        let prefix = stage.prefix(subject);
        bar.set_message(prefix.clone());
        bar.enable_steady_tick(Duration::from_millis(100));
        StageBar { bar, prefix }
    }

    pub(crate) fn clear(&self) {
        let _ = self.multi.clear();
    }
}

/// A running spinner; `Send`, so it can travel into spawned chart loads.
pub struct StageBar {
    bar: ProgressBar,
    prefix: String,
}

impl StageBar {
    pub(crate) fn finish<T: Tally>(&self, result: &Result<T, FetchError>) {
        self.bar
            .finish_with_message(format!("{} {}", self.prefix, outcome_text(result)));
    }
}

/// Await `fut` under a spinner that ends with the load's tally or error kind.
pub async fn track<T: Tally>(
    progress: &ProgressState,
    stage: Stage,
    subject: &str,
    fut: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    let bar = progress.begin(stage, subject);
    let result = fut.await;
    bar.finish(&result);
    result
}
