use crate::tiler::RescaleRange;
use crate::transport::RetryPolicy;
use crate::utils::url::join_url;
use std::time::Duration;

pub const DEFAULT_TITILER_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_URL: &str = "http://localhost:8002";
pub const DEFAULT_COLORMAP: &str = "blues_r";

/// Where the forecast catalog is read from.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogSource {
    /// Path or URL of a static `catalog.json`
    Static(String),
    /// Root of a STAC API
    Api(String),
}

impl CatalogSource {
    pub fn location(&self) -> &str {
        match self {
            CatalogSource::Static(location) | CatalogSource::Api(location) => location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogSource,
    pub titiler_url: String,
    pub data_url: String,
    pub port: u16,
    pub default_colormap: String,
    pub default_range: RescaleRange,
    pub request_timeout: Duration,
    pub catalog_ttl: Duration,
    pub session_idle: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    /// Static catalog published alongside the data.
    pub fn default_catalog_path(data_url: &str) -> String {
        join_url(data_url, "data/stac/catalog.json")
            .unwrap_or_else(|_| format!("{}/data/stac/catalog.json", data_url.trim_end_matches('/')))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            catalog: CatalogSource::Static(Config::default_catalog_path(DEFAULT_DATA_URL)),
            titiler_url: DEFAULT_TITILER_URL.to_string(),
            data_url: DEFAULT_DATA_URL.to_string(),
            port: 8001,
            default_colormap: DEFAULT_COLORMAP.to_string(),
            default_range: RescaleRange::NEUTRAL,
            request_timeout: Duration::from_secs(30),
            catalog_ttl: Duration::from_secs(60),
            session_idle: Duration::from_secs(30 * 60),
            retry: RetryPolicy::default(),
        }
    }
}
