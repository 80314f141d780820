use crate::error::Result;
use crate::utils::url::{encode_query_value, normalize_url_path};

pub const TILE_MATRIX_SET: &str = "WebMercatorQuad";

/// Formats bounds the way the raster service expects them: `min,max`.
pub fn format_rescale(min: f64, max: f64) -> String {
    format!("{},{}", min, max)
}

/// XYZ template for one asset, keeping `{z}/{x}/{y}` literal for the map
/// client. The asset href is form-encoded into the `url` parameter and
/// decodes back to exactly the href given.
pub fn build_tile_url(
    tile_endpoint_base: &str,
    asset_href: &str,
    band_index: u32,
    rescale_min: f64,
    rescale_max: f64,
    colormap_name: &str,
) -> Result<String> {
    let url = format!(
        "{}/cog/tiles/{}/{{z}}/{{x}}/{{y}}?url={}&bidx={}&rescale={}&colormap_name={}",
        tile_endpoint_base.trim_end_matches('/'),
        TILE_MATRIX_SET,
        encode_query_value(asset_href)?,
        band_index,
        format_rescale(rescale_min, rescale_max),
        colormap_name
    );
    normalize_url_path(&url)
}

/// Decoded value of query parameter `name`.
#[cfg(test)]
pub(crate) fn query_param(url: &str, name: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
