//! Request-scoped view state shared by every screening view.
//!
//! Each asynchronous load is tagged with a [`RequestToken`]; a slot only
//! accepts the result of the most recent request it issued, so a slow
//! response that arrives after a newer one is dropped instead of
//! overwriting it.

use crate::error::FetchError;
use crate::model::View;
use crate::normalize::{DerivedScreeningRecord, normalize};
use crate::series::PreparedSeries;
use crate::sources::ScreeningBatch;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Identifies one issued request. Tokens grow monotonically per sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Default)]
pub struct RequestSequencer {
    last: u64,
}

impl RequestSequencer {
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    pub const fn issue(&mut self) -> RequestToken {
        self.last += 1;
        RequestToken(self.last)
    }
}

#[derive(Debug, Default)]
pub enum Resource<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(FetchError),
}

impl<T> Resource<T> {
    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// A resource plus the token of the request it is waiting for.
#[derive(Debug)]
pub struct Slot<T> {
    resource: Resource<T>,
    pending: Option<RequestToken>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            resource: Resource::Idle,
            pending: None,
        }
    }
}

impl<T> Slot<T> {
    pub const fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    /// Start a new load, superseding any request still in flight.
    pub fn begin(&mut self, sequencer: &mut RequestSequencer) -> RequestToken {
        let token = sequencer.issue();
        self.pending = Some(token);
        self.resource = Resource::Loading;
        token
    }

    /// Apply a response. Returns `false` when `token` is stale and the
    /// result was dropped.
    pub fn complete(&mut self, token: RequestToken, result: Result<T, FetchError>) -> bool {
        if self.pending != Some(token) {
            debug!(?token, latest = ?self.pending, "discarding stale response");
            return false;
        }
        self.pending = None;
        self.resource = match result {
            Ok(value) => Resource::Ready(value),
            Err(error) => Resource::Failed(error),
        };
        true
    }
}

/// Instrument picked from a view for charting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ts_code: String,
    pub name: String,
}

/// Screening list of one view, normalized and ranked.
#[derive(Debug, Clone)]
pub struct RankedView {
    pub view: View,
    pub reported_count: usize,
    pub diversification: Option<String>,
    pub records: Vec<DerivedScreeningRecord>,
}

impl RankedView {
    pub fn from_batch(batch: &ScreeningBatch) -> Self {
        Self {
            view: batch.view,
            reported_count: batch.count,
            diversification: batch.diversification.clone(),
            records: normalize(&batch.records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// List, selection and chart state of a single view.
#[derive(Debug)]
pub struct ViewState<T> {
    pub list: Slot<T>,
    pub selected: Option<Selection>,
    pub chart: Slot<PreparedSeries>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            list: Slot::default(),
            selected: None,
            chart: Slot::default(),
        }
    }
}

impl<T> ViewState<T> {
    /// Select an instrument and start loading its chart.
    pub fn select(
        &mut self,
        selection: Selection,
        sequencer: &mut RequestSequencer,
    ) -> RequestToken {
        self.selected = Some(selection);
        self.chart.begin(sequencer)
    }
}

/// State of every view plus the chart cache for instruments shown in a report.
#[derive(Debug, Default)]
pub struct DashboardState {
    sequencer: RequestSequencer,
    views: FxHashMap<View, ViewState<RankedView>>,
    charts: FxHashMap<String, Slot<PreparedSeries>>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_view(&mut self, view: View) -> RequestToken {
        let Self {
            sequencer, views, ..
        } = self;
        views.entry(view).or_default().list.begin(sequencer)
    }

    pub fn complete_view(
        &mut self,
        view: View,
        token: RequestToken,
        result: Result<ScreeningBatch, FetchError>,
    ) -> bool {
        let ranked = result.map(|batch| RankedView::from_batch(&batch));
        self.views
            .entry(view)
            .or_default()
            .list
            .complete(token, ranked)
    }

    pub fn select(&mut self, view: View, selection: Selection) -> RequestToken {
        let Self {
            sequencer, views, ..
        } = self;
        views.entry(view).or_default().select(selection, sequencer)
    }

    pub fn complete_selection(
        &mut self,
        view: View,
        token: RequestToken,
        result: Result<PreparedSeries, FetchError>,
    ) -> bool {
        self.views
            .entry(view)
            .or_default()
            .chart
            .complete(token, result)
    }

    pub fn begin_chart(&mut self, ts_code: &str) -> RequestToken {
        let Self {
            sequencer, charts, ..
        } = self;
        charts
            .entry(ts_code.to_string())
            .or_default()
            .begin(sequencer)
    }

    pub fn complete_chart(
        &mut self,
        ts_code: &str,
        token: RequestToken,
        result: Result<PreparedSeries, FetchError>,
    ) -> bool {
        self.charts
            .get_mut(ts_code)
            .is_some_and(|slot| slot.complete(token, result))
    }

    pub fn view(&self, view: View) -> Option<&ViewState<RankedView>> {
        self.views.get(&view)
    }

    pub fn chart(&self, ts_code: &str) -> Option<&Resource<PreparedSeries>> {
        self.charts.get(ts_code).map(Slot::resource)
    }

    /// Views in display order, skipping ones that were never requested.
    pub fn views(&self) -> impl Iterator<Item = (View, &ViewState<RankedView>)> {
        View::ALL
            .into_iter()
            .filter_map(|view| self.views.get(&view).map(|state| (view, state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScreeningRecord, UndervaluedRecord};

    fn batch(codes: &[(&str, f64, f64)]) -> ScreeningBatch {
        ScreeningBatch {
            view: View::Undervalued,
            count: codes.len(),
            records: codes
                .iter()
                .map(|(code, current, reference)| {
                    ScreeningRecord::Undervalued(UndervaluedRecord {
                        ts_code: (*code).to_string(),
                        name: (*code).to_string(),
                        total_mv_10k: 1.0,
                        pe_ttm: None,
                        current_close: *current,
                        weekly_last_close: *current,
                        avg_close_1y: Some(*reference),
                    })
                })
                .collect(),
            diversification: None,
        }
    }

    fn empty_series() -> PreparedSeries {
        crate::series::prepare_series(&[])
    }

    #[test]
    fn tokens_increase_monotonically() {
        let mut sequencer = RequestSequencer::new();
        let a = sequencer.issue();
        let b = sequencer.issue();
        assert!(b > a);
    }

    #[test]
    fn slot_moves_through_loading_to_ready() {
        let mut sequencer = RequestSequencer::new();
        let mut slot: Slot<u32> = Slot::default();
        assert!(matches!(slot.resource(), Resource::Idle));
        let token = slot.begin(&mut sequencer);
        assert!(matches!(slot.resource(), Resource::Loading));
        assert!(slot.complete(token, Ok(7)));
        assert_eq!(slot.resource().ready(), Some(&7));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut sequencer = RequestSequencer::new();
        let mut slot: Slot<&str> = Slot::default();
        let first = slot.begin(&mut sequencer);
        let second = slot.begin(&mut sequencer);

        assert!(slot.complete(second, Ok("second")));
        assert!(!slot.complete(first, Ok("first")));
        assert_eq!(slot.resource().ready(), Some(&"second"));
    }

    #[test]
    fn late_response_after_newer_failure_is_dropped() {
        let mut sequencer = RequestSequencer::new();
        let mut slot: Slot<u8> = Slot::default();
        let first = slot.begin(&mut sequencer);
        let second = slot.begin(&mut sequencer);
        let error = FetchError::InvalidParameter {
            name: "limit",
            value: f64::NAN,
        };
        assert!(slot.complete(second, Err(error)));
        assert!(!slot.complete(first, Ok(1)));
        assert!(slot.resource().error().is_some());
    }

    #[test]
    fn dashboard_ranks_completed_view() {
        let mut state = DashboardState::new();
        let token = state.begin_view(View::Undervalued);
        let result = Ok(batch(&[("a", 90.0, 100.0), ("b", 80.0, 50.0)]));
        assert!(state.complete_view(View::Undervalued, token, result));

        let view = state.view(View::Undervalued).unwrap();
        let ranked = view.list.resource().ready().unwrap();
        assert_eq!(ranked.records[0].record.ts_code(), "b");
        assert_eq!(ranked.len(), 2);
        assert_eq!(state.views().count(), 1);
    }

    #[test]
    fn reselecting_supersedes_previous_chart() {
        let mut state = DashboardState::new();
        let first = state.select(
            View::Undervalued,
            Selection {
                ts_code: "a".to_string(),
                name: "A".to_string(),
            },
        );
        let second = state.select(
            View::Undervalued,
            Selection {
                ts_code: "b".to_string(),
                name: "B".to_string(),
            },
        );
        assert!(!state.complete_selection(View::Undervalued, first, Ok(empty_series())));
        assert!(state.complete_selection(View::Undervalued, second, Ok(empty_series())));
        let view = state.view(View::Undervalued).unwrap();
        assert_eq!(view.selected.as_ref().unwrap().ts_code, "b");
    }

    #[test]
    fn chart_for_unknown_code_is_ignored() {
        let mut state = DashboardState::new();
        let token = state.begin_chart("a");
        assert!(!state.complete_chart("b", token, Ok(empty_series())));
        assert!(state.complete_chart("a", token, Ok(empty_series())));
        assert!(state.chart("a").unwrap().ready().is_some());
    }
}
