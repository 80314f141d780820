use super::{RescaleRange, TilerClient};
use crate::error::{Result, ViewerError};
use crate::transport::Transport;
use crate::utils::url::encode_query_value;
use serde_json::Value;
use tracing::debug;

impl TilerClient {
    pub fn statistics_url(&self, asset_href: &str, band_index: u32) -> Result<String> {
        Ok(format!(
            "{}/cog/statistics?url={}&bidx={}",
            self.base,
            encode_query_value(asset_href)?,
            band_index
        ))
    }

    /// Min/max of one band of an asset as reported by the raster service.
    pub async fn band_statistics(&self, asset_href: &str, band_index: u32) -> Result<RescaleRange> {
        let unavailable = |message: String| ViewerError::StatisticsUnavailable {
            href: asset_href.to_string(),
            band_index,
            message,
        };

        let url = self.statistics_url(asset_href, band_index)?;
        let body = self
            .transport
            .get_json(&url)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let range = parse_statistics(&body).ok_or_else(|| {
            unavailable("response has no band entry with numeric min/max".to_string())
        })?;
        debug!(url = %url, min = range.min, max = range.max, "Band statistics");
        Ok(range)
    }
}

/// The response is keyed by a band identifier chosen by the service (`b1`,
/// a band description, ...), so the first entry is taken whatever its key.
fn parse_statistics(body: &Value) -> Option<RescaleRange> {
    let stats = body.as_object()?.values().next()?;
    let min = stats.get("min")?.as_f64()?;
    let max = stats.get("max")?.as_f64()?;
    Some(RescaleRange { min, max })
}
