//! Chart series preparation: chronological order, padded price domain and
//! the traded-amount unit conversion used by tooltips.

use crate::model::ObservationPoint;

const DOMAIN_PADDING_RATIO: f64 = 0.05;
const FLAT_SERIES_RATIO: f64 = 0.01;
const FLAT_SERIES_MIN_SPAN: f64 = 0.5;
/// Upstream amounts are in thousands; one hundred-million is 1e5 thousands.
const THOUSANDS_PER_HUNDRED_MILLION: f64 = 100_000.0;

/// Closed value range `[low, high]` for a price axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartDomain {
    pub low: f64,
    pub high: f64,
}

impl ChartDomain {
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    /// Map `value` onto a vertical pixel axis of `height`, with `high` at the top.
    pub fn project(&self, value: f64, height: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return height / 2.0;
        }
        let ratio = (value - self.low) / span;
        height - ratio * height
    }
}

/// An ordered series ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub ordered: Vec<ObservationPoint>,
    /// `None` for an empty series; callers must not draw a price axis then.
    pub price_domain: Option<ChartDomain>,
}

impl PreparedSeries {
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn volume_max(&self) -> Option<f64> {
        self.ordered
            .iter()
            .map(|point| point.vol)
            .filter(|vol| vol.is_finite())
            .reduce(f64::max)
    }

    pub fn first_date(&self) -> Option<chrono::NaiveDate> {
        self.ordered.first().map(|point| point.trade_date)
    }

    pub fn last_date(&self) -> Option<chrono::NaiveDate> {
        self.ordered.last().map(|point| point.trade_date)
    }
}

pub fn prepare_series(points: &[ObservationPoint]) -> PreparedSeries {
    let mut ordered = points.to_vec();
    ordered.sort_by_key(|point| point.trade_date);
    let price_domain = price_domain(&ordered);
    PreparedSeries {
        ordered,
        price_domain,
    }
}

fn price_domain(points: &[ObservationPoint]) -> Option<ChartDomain> {
    let mut closes = points.iter().map(|point| point.close);
    let first = closes.next()?;
    let (min_close, max_close) = closes.fold((first, first), |(min, max), close| {
        (min.min(close), max.max(close))
    });

    let mut diff = max_close - min_close;
    if diff == 0.0 {
        diff = (max_close * FLAT_SERIES_RATIO).max(FLAT_SERIES_MIN_SPAN);
    }
    let padding = diff * DOMAIN_PADDING_RATIO;

    Some(ChartDomain {
        low: min_close - padding,
        high: max_close + padding,
    })
}

/// Convert an amount in thousands into hundred-millions.
pub fn convert_amount(amount_thousands: f64) -> f64 {
    amount_thousands / THOUSANDS_PER_HUNDRED_MILLION
}

pub fn format_amount(amount_thousands: f64) -> String {
    format!("{:.2}", convert_amount(amount_thousands))
}
