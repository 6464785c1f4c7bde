use crate::error::FetchError;
use crate::model::{
    BottomReversalRecord, EtfVolumeSurgeRecord, PortfolioResponse, ScreeningRecord,
    ScreeningResponse, UndervaluedRecord, View, WeeklyVolumeSurgeRecord,
};
use tracing::{debug, info};

use super::{ApiClient, finite_param};

const UNDERVALUED_PATH: &str = "large_cap_below_1y_avg_price";
const WEEKLY_VOLUME_SURGE_PATH: &str = "low_pe_volume_surge";
const BOTTOM_REVERSAL_PATH: &str = "bottom_reversal";
const ETF_VOLUME_SURGE_PATH: &str = "etf_volume_surge";
const SMART_PORTFOLIO_PATH: &str = "smart_portfolio";

pub const DEFAULT_MIN_MV: f64 = 10_000_000.0;
pub const DEFAULT_MAX_PE: f64 = 30.0;
pub const DEFAULT_MIN_RATIO: f64 = 1.5;
pub const DEFAULT_LOOKBACK_WEEKS: u32 = 3;
pub const DEFAULT_MIN_AMOUNT: f64 = 1.0;
pub const DEFAULT_PORTFOLIO_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndervaluedFilter {
    /// Minimum market value, in units of 10k.
    pub min_mv: f64,
    pub max_pe: f64,
}

impl Default for UndervaluedFilter {
    fn default() -> Self {
        Self {
            min_mv: DEFAULT_MIN_MV,
            max_pe: DEFAULT_MAX_PE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtfSurgeFilter {
    pub min_ratio: f64,
    pub lookback_weeks: u32,
    /// Minimum traded amount over the last week, in hundred-millions.
    pub min_amount: f64,
}

impl Default for EtfSurgeFilter {
    fn default() -> Self {
        Self {
            min_ratio: DEFAULT_MIN_RATIO,
            lookback_weeks: DEFAULT_LOOKBACK_WEEKS,
            min_amount: DEFAULT_MIN_AMOUNT,
        }
    }
}

/// Filter values for every view, forwarded as-is to the API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningFilters {
    pub undervalued: UndervaluedFilter,
    pub etf: EtfSurgeFilter,
    pub portfolio_limit: u32,
}

impl Default for ScreeningFilters {
    fn default() -> Self {
        Self {
            undervalued: UndervaluedFilter::default(),
            etf: EtfSurgeFilter::default(),
            portfolio_limit: DEFAULT_PORTFOLIO_LIMIT,
        }
    }
}

/// Records returned by one screening endpoint.
#[derive(Debug, Clone)]
pub struct ScreeningBatch {
    pub view: View,
    /// Count reported by the server; may differ from `records.len()`.
    pub count: usize,
    pub records: Vec<ScreeningRecord>,
    /// Portfolio-level diversification label (smart portfolio only).
    pub diversification: Option<String>,
}

impl ScreeningBatch {
    fn from_response<T>(
        view: View,
        response: ScreeningResponse<T>,
        wrap: impl Fn(T) -> ScreeningRecord,
    ) -> Self {
        if response.count != response.data.len() {
            debug!(
                %view,
                reported = response.count,
                received = response.data.len(),
                "record count mismatch"
            );
        }
        Self {
            view,
            count: response.count,
            records: response.data.into_iter().map(wrap).collect(),
            diversification: None,
        }
    }
}

pub async fn fetch_view(
    api: &ApiClient,
    view: View,
    filters: &ScreeningFilters,
) -> Result<ScreeningBatch, FetchError> {
    let batch = match view {
        View::Undervalued => fetch_undervalued(api, filters.undervalued).await,
        View::WeeklyVolumeSurge => fetch_weekly_volume_surge(api).await,
        View::BottomReversal => fetch_bottom_reversal(api).await,
        View::EtfVolumeSurge => fetch_etf_volume_surge(api, filters.etf).await,
        View::SmartPortfolio => fetch_smart_portfolio(api, filters.portfolio_limit).await,
    }?;
    info!(%view, records = batch.records.len(), "screening view loaded");
    Ok(batch)
}

pub async fn fetch_undervalued(
    api: &ApiClient,
    filter: UndervaluedFilter,
) -> Result<ScreeningBatch, FetchError> {
    let query = [
        ("min_mv", finite_param("min_mv", filter.min_mv)?),
        ("max_pe", finite_param("max_pe", filter.max_pe)?),
    ];
    let response: ScreeningResponse<UndervaluedRecord> =
        api.fetch_json(UNDERVALUED_PATH, &query).await?;
    Ok(ScreeningBatch::from_response(
        View::Undervalued,
        response,
        ScreeningRecord::Undervalued,
    ))
}

pub async fn fetch_weekly_volume_surge(api: &ApiClient) -> Result<ScreeningBatch, FetchError> {
    let response: ScreeningResponse<WeeklyVolumeSurgeRecord> =
        api.fetch_json(WEEKLY_VOLUME_SURGE_PATH, &[]).await?;
    Ok(ScreeningBatch::from_response(
        View::WeeklyVolumeSurge,
        response,
        ScreeningRecord::WeeklyVolumeSurge,
    ))
}

pub async fn fetch_bottom_reversal(api: &ApiClient) -> Result<ScreeningBatch, FetchError> {
    let response: ScreeningResponse<BottomReversalRecord> =
        api.fetch_json(BOTTOM_REVERSAL_PATH, &[]).await?;
    Ok(ScreeningBatch::from_response(
        View::BottomReversal,
        response,
        ScreeningRecord::BottomReversal,
    ))
}

pub async fn fetch_etf_volume_surge(
    api: &ApiClient,
    filter: EtfSurgeFilter,
) -> Result<ScreeningBatch, FetchError> {
    let query = [
        ("min_ratio", finite_param("min_ratio", filter.min_ratio)?),
        ("lookback_weeks", filter.lookback_weeks.to_string()),
        ("min_amount", finite_param("min_amount", filter.min_amount)?),
    ];
    let response: ScreeningResponse<EtfVolumeSurgeRecord> =
        api.fetch_json(ETF_VOLUME_SURGE_PATH, &query).await?;
    Ok(ScreeningBatch::from_response(
        View::EtfVolumeSurge,
        response,
        ScreeningRecord::EtfVolumeSurge,
    ))
}

pub async fn fetch_smart_portfolio(
    api: &ApiClient,
    limit: u32,
) -> Result<ScreeningBatch, FetchError> {
    let query = [("limit", limit.to_string())];
    let response: PortfolioResponse = api.fetch_json(SMART_PORTFOLIO_PATH, &query).await?;
    let PortfolioResponse {
        count,
        diversification,
        data,
    } = response;
    let mut batch = ScreeningBatch::from_response(
        View::SmartPortfolio,
        ScreeningResponse { count, data },
        ScreeningRecord::SmartPortfolio,
    );
    batch.diversification = Some(diversification);
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    #[tokio::test]
    async fn non_finite_filter_fails_before_any_request() {
        // Port 9 (discard) is never contacted: validation runs first.
        let api = ApiClient::new(Client::new(), "http://127.0.0.1:9", 1);
        let filter = UndervaluedFilter {
            min_mv: f64::NAN,
            max_pe: 30.0,
        };
        let error = fetch_undervalued(&api, filter).await.unwrap_err();
        assert!(matches!(
            error,
            FetchError::InvalidParameter { name: "min_mv", .. }
        ));
    }

    #[test]
    fn batch_wraps_records_in_their_view_variant() {
        let response = ScreeningResponse {
            count: 3,
            data: vec![BottomReversalRecord {
                ts_code: "000002.SZ".to_string(),
                name: "Vanke".to_string(),
                price: 7.0,
                market_value_yi: 800.0,
                weekly_change_pct: 4.2,
                surge_ratio: 2.0,
                down_weeks: 6,
                week_date: "2025-06-13".to_string(),
            }],
        };
        let batch = ScreeningBatch::from_response(
            View::BottomReversal,
            response,
            ScreeningRecord::BottomReversal,
        );
        assert_eq!(batch.count, 3);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].view(), View::BottomReversal);
        assert!(batch.diversification.is_none());
    }

    #[test]
    fn defaults_match_dashboard_filters() {
        let filters = ScreeningFilters::default();
        assert_eq!(filters.undervalued.min_mv, 10_000_000.0);
        assert_eq!(filters.undervalued.max_pe, 30.0);
        assert_eq!(filters.etf.lookback_weeks, 3);
        assert_eq!(filters.portfolio_limit, 5);
    }
}
