//! Wire and domain types for the screening API.
//!
//! Field names on the wire are carried verbatim through `serde` renames; the
//! Rust side always sees named, typed fields. Optional numbers stay
//! `Option<f64>` all the way to presentation so that "unknown" never turns
//! into a zero.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

const TRADE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];
const ETF_MAX_VOLUME_PREFIX: &str = "过去";
const ETF_MAX_VOLUME_SUFFIX: &str = "最大周成交量(手)";

/// Screening strategy that produced a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Undervalued,
    WeeklyVolumeSurge,
    BottomReversal,
    EtfVolumeSurge,
    SmartPortfolio,
}

impl View {
    pub const ALL: [Self; 5] = [
        Self::Undervalued,
        Self::WeeklyVolumeSurge,
        Self::BottomReversal,
        Self::EtfVolumeSurge,
        Self::SmartPortfolio,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Self::Undervalued => "Large caps below 1Y average",
            Self::WeeklyVolumeSurge => "Weekly volume surge",
            Self::BottomReversal => "Bottom reversal",
            Self::EtfVolumeSurge => "ETF weekly volume surge",
            Self::SmartPortfolio => "Smart portfolio",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Undervalued => "undervalued",
            Self::WeeklyVolumeSurge => "weekly-volume-surge",
            Self::BottomReversal => "bottom-reversal",
            Self::EtfVolumeSurge => "etf-volume-surge",
            Self::SmartPortfolio => "smart-portfolio",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// `{ count, data }` envelope shared by the screening endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreeningResponse<T> {
    pub count: usize,
    pub data: Vec<T>,
}

/// Large caps trading below their one-year average close.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UndervaluedRecord {
    pub ts_code: String,
    pub name: String,
    /// Market value in units of 10k.
    pub total_mv_10k: f64,
    pub pe_ttm: Option<f64>,
    pub current_close: f64,
    pub weekly_last_close: f64,
    pub avg_close_1y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeeklyVolumeSurgeRecord {
    pub ts_code: String,
    #[serde(rename = "名称")]
    pub name: String,
    #[serde(rename = "市值(亿)")]
    pub market_value_yi: f64,
    #[serde(rename = "PE(TTM)")]
    pub pe_ttm: Option<f64>,
    #[serde(rename = "现价")]
    pub price: f64,
    #[serde(rename = "周放量倍数")]
    pub surge_ratio: f64,
    #[serde(rename = "是否刚启动")]
    pub just_started: bool,
    #[serde(rename = "最近周涨跌幅%")]
    pub weekly_change_pct: f64,
    #[serde(rename = "最近周线日期")]
    pub week_date: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BottomReversalRecord {
    pub ts_code: String,
    #[serde(rename = "名称")]
    pub name: String,
    #[serde(rename = "现价")]
    pub price: f64,
    #[serde(rename = "市值(亿)")]
    pub market_value_yi: f64,
    #[serde(rename = "本周涨幅%")]
    pub weekly_change_pct: f64,
    #[serde(rename = "放量倍数")]
    pub surge_ratio: f64,
    #[serde(rename = "连续下跌周数")]
    pub down_weeks: u32,
    #[serde(rename = "最近周线日期")]
    pub week_date: String,
}

/// ETF weekly volume surge.
///
/// The upstream key for the lookback maximum embeds the lookback length
/// (`过去3周最大周成交量(手)`), so it is resolved from the remaining keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEtfVolumeSurgeRecord")]
pub struct EtfVolumeSurgeRecord {
    pub ts_code: String,
    pub name: String,
    pub surge_ratio: f64,
    /// Last week's traded amount, already in hundred-millions.
    pub last_week_amount_yi: f64,
    /// Last week's volume in lots.
    pub last_week_volume: f64,
    /// Largest weekly volume over the lookback window, in lots.
    pub lookback_max_volume: f64,
    pub week_end_date: String,
}

#[derive(Debug, Deserialize)]
struct RawEtfVolumeSurgeRecord {
    ts_code: String,
    #[serde(rename = "名称")]
    name: String,
    #[serde(rename = "周放量倍数")]
    surge_ratio: f64,
    #[serde(rename = "最近一周成交额(亿元)")]
    last_week_amount_yi: f64,
    #[serde(rename = "最近一周成交量(手)")]
    last_week_volume: f64,
    #[serde(rename = "最近周线截止日")]
    week_end_date: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TryFrom<RawEtfVolumeSurgeRecord> for EtfVolumeSurgeRecord {
    type Error = String;

    fn try_from(raw: RawEtfVolumeSurgeRecord) -> Result<Self, Self::Error> {
        let (key, value) = raw
            .rest
            .iter()
            .find(|(key, _)| {
                key.starts_with(ETF_MAX_VOLUME_PREFIX) && key.ends_with(ETF_MAX_VOLUME_SUFFIX)
            })
            .ok_or_else(|| format!("missing field `{ETF_MAX_VOLUME_PREFIX}N{ETF_MAX_VOLUME_SUFFIX}`"))?;
        let lookback_max_volume = value
            .as_f64()
            .ok_or_else(|| format!("field `{key}` is not a number"))?;

        Ok(Self {
            ts_code: raw.ts_code,
            name: raw.name,
            surge_ratio: raw.surge_ratio,
            last_week_amount_yi: raw.last_week_amount_yi,
            last_week_volume: raw.last_week_volume,
            lookback_max_volume,
            week_end_date: raw.week_end_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortfolioItem {
    pub ts_code: String,
    #[serde(rename = "名称")]
    pub name: String,
    #[serde(rename = "策略标签")]
    pub strategy_tag: String,
    #[serde(rename = "行业")]
    pub industry: String,
    #[serde(rename = "核心指标")]
    pub key_metric: String,
    #[serde(rename = "权重分数")]
    pub weight_score: f64,
}

/// Smart portfolio response carries a diversification label next to the items.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioResponse {
    pub count: usize,
    pub diversification: String,
    pub data: Vec<PortfolioItem>,
}

/// One instrument's snapshot under a specific screening strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreeningRecord {
    Undervalued(UndervaluedRecord),
    WeeklyVolumeSurge(WeeklyVolumeSurgeRecord),
    BottomReversal(BottomReversalRecord),
    EtfVolumeSurge(EtfVolumeSurgeRecord),
    SmartPortfolio(PortfolioItem),
}

impl ScreeningRecord {
    pub const fn view(&self) -> View {
        match self {
            Self::Undervalued(_) => View::Undervalued,
            Self::WeeklyVolumeSurge(_) => View::WeeklyVolumeSurge,
            Self::BottomReversal(_) => View::BottomReversal,
            Self::EtfVolumeSurge(_) => View::EtfVolumeSurge,
            Self::SmartPortfolio(_) => View::SmartPortfolio,
        }
    }

    pub fn ts_code(&self) -> &str {
        match self {
            Self::Undervalued(r) => &r.ts_code,
            Self::WeeklyVolumeSurge(r) => &r.ts_code,
            Self::BottomReversal(r) => &r.ts_code,
            Self::EtfVolumeSurge(r) => &r.ts_code,
            Self::SmartPortfolio(r) => &r.ts_code,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Undervalued(r) => &r.name,
            Self::WeeklyVolumeSurge(r) => &r.name,
            Self::BottomReversal(r) => &r.name,
            Self::EtfVolumeSurge(r) => &r.name,
            Self::SmartPortfolio(r) => &r.name,
        }
    }

    pub const fn current_price(&self) -> Option<f64> {
        match self {
            Self::Undervalued(r) => Some(r.current_close),
            Self::WeeklyVolumeSurge(r) => Some(r.price),
            Self::BottomReversal(r) => Some(r.price),
            Self::EtfVolumeSurge(_) | Self::SmartPortfolio(_) => None,
        }
    }

    /// Reference average the current price is compared against.
    ///
    /// Only the undervaluation screen ships one (the trailing one-year
    /// average close); other strategies rank upstream.
    pub const fn reference_price(&self) -> Option<f64> {
        match self {
            Self::Undervalued(r) => r.avg_close_1y,
            _ => None,
        }
    }
}

/// One trading day for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    #[serde(
        deserialize_with = "deserialize_trade_date",
        serialize_with = "serialize_trade_date"
    )]
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume in lots.
    pub vol: f64,
    /// Traded amount in thousands of currency units.
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceVolumeResponse {
    pub ts_code: String,
    pub count: usize,
    pub data: Vec<ObservationPoint>,
}

pub fn parse_trade_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    TRADE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn deserialize_trade_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_trade_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid trade_date `{raw}`")))
}

fn serialize_trade_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_undervalued_response_with_null_pe() {
        let body = r#"{
            "count": 1,
            "data": [{
                "ts_code": "600519.SH",
                "name": "Kweichow Moutai",
                "total_mv_10k": 210000000.0,
                "pe_ttm": null,
                "current_close": 1500.5,
                "weekly_last_close": 1490.0,
                "avg_close_1y": 1650.0
            }]
        }"#;
        let response: ScreeningResponse<UndervaluedRecord> =
            serde_json::from_str(body).unwrap();
        assert_eq!(response.count, 1);
        let record = &response.data[0];
        assert_eq!(record.pe_ttm, None);
        assert_eq!(record.avg_close_1y, Some(1650.0));
    }

    #[test]
    fn rejects_missing_numeric_field_instead_of_defaulting() {
        let body = r#"{"ts_code": "600519.SH", "name": "x", "total_mv_10k": 1.0,
            "pe_ttm": 10.0, "weekly_last_close": 1.0, "avg_close_1y": 1.0}"#;
        let result: Result<UndervaluedRecord, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }

    #[test]
    fn decodes_weekly_volume_surge_wire_names() {
        let body = r#"{
            "ts_code": "000001.SZ",
            "名称": "平安银行",
            "市值(亿)": 2100.5,
            "PE(TTM)": null,
            "现价": 10.82,
            "周放量倍数": 2.4,
            "是否刚启动": true,
            "最近周涨跌幅%": 3.1,
            "最近周线日期": "2025-06-13"
        }"#;
        let record: WeeklyVolumeSurgeRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.name, "平安银行");
        assert!(record.just_started);
        assert_eq!(record.pe_ttm, None);
    }

    #[test]
    fn resolves_etf_lookback_key() {
        let body = r#"{
            "ts_code": "510300.SH",
            "名称": "沪深300ETF",
            "周放量倍数": 1.9,
            "最近一周成交额(亿元)": 42.3,
            "最近一周成交量(手)": 1200000,
            "过去5周最大周成交量(手)": 800000,
            "最近周线截止日": "2025-06-13"
        }"#;
        let record: EtfVolumeSurgeRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.lookback_max_volume, 800_000.0);
    }

    #[test]
    fn etf_without_lookback_key_is_a_contract_error() {
        let body = r#"{
            "ts_code": "510300.SH",
            "名称": "沪深300ETF",
            "周放量倍数": 1.9,
            "最近一周成交额(亿元)": 42.3,
            "最近一周成交量(手)": 1200000,
            "最近周线截止日": "2025-06-13"
        }"#;
        let result: Result<EtfVolumeSurgeRecord, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }

    #[test]
    fn decodes_portfolio_response() {
        let body = r#"{
            "count": 1,
            "diversification": "3 industries",
            "data": [{
                "ts_code": "600036.SH",
                "名称": "招商银行",
                "策略标签": "低估值",
                "行业": "银行",
                "核心指标": "PE 6.1",
                "权重分数": 82.5
            }]
        }"#;
        let response: PortfolioResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.diversification, "3 industries");
        assert_eq!(response.data[0].weight_score, 82.5);
    }

    #[test]
    fn trade_date_accepts_dashed_and_compact_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
        assert_eq!(parse_trade_date("2025-01-07"), Some(expected));
        assert_eq!(parse_trade_date("20250107"), Some(expected));
        assert_eq!(parse_trade_date("07/01/2025"), None);
    }

    #[test]
    fn observation_point_round_trips_date_format() {
        let body = r#"{"trade_date":"2025-03-04","open":1.0,"high":2.0,"low":0.5,"close":1.5,"vol":100.0,"amount":2500.0}"#;
        let point: ObservationPoint = serde_json::from_str(body).unwrap();
        let encoded = serde_json::to_string(&point).unwrap();
        assert!(encoded.contains("\"trade_date\":\"2025-03-04\""));
    }

    #[test]
    fn only_undervalued_records_carry_a_reference() {
        let record = ScreeningRecord::BottomReversal(BottomReversalRecord {
            ts_code: "000002.SZ".to_string(),
            name: "Vanke".to_string(),
            price: 7.0,
            market_value_yi: 800.0,
            weekly_change_pct: 4.2,
            surge_ratio: 2.0,
            down_weeks: 6,
            week_date: "2025-06-13".to_string(),
        });
        assert_eq!(record.current_price(), Some(7.0));
        assert_eq!(record.reference_price(), None);
        assert_eq!(record.view(), View::BottomReversal);
    }
}
