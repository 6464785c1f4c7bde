use crate::error::FetchError;
use crate::model::PriceVolumeResponse;
use tracing::info;

use super::ApiClient;

const PRICE_VOLUME_PATH: &str = "price_volume_1y";

/// One year of daily price/volume observations for `ts_code`, in delivery order.
pub async fn fetch_price_volume_1y(
    api: &ApiClient,
    ts_code: &str,
) -> Result<PriceVolumeResponse, FetchError> {
    let query = [("ts_code", ts_code.to_string())];
    let response: PriceVolumeResponse = api.fetch_json(PRICE_VOLUME_PATH, &query).await?;
    info!(
        ts_code = %response.ts_code,
        points = response.data.len(),
        "price/volume series loaded"
    );
    Ok(response)
}
