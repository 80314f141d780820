use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

pub mod api;
pub mod forecast;
pub mod stac;
pub mod static_file;

pub use stac::BandEntry;

/// Initialization date and the exclusive end of the forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastWindow {
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days().max(0) as u32
    }

    /// Highest valid leadtime; leadtimes run from 0 to `days - 1`.
    pub fn max_leadtime(&self) -> Option<u32> {
        self.days().checked_sub(1)
    }
}

/// Ordered `variable name -> band index` mapping of a raster asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandMapping(Vec<BandEntry>);

impl BandMapping {
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.0.iter().find(|b| b.name == name).map(|b| b.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BandEntry> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<BandEntry>> for BandMapping {
    fn from(bands: Vec<BandEntry>) -> Self {
        BandMapping(bands)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRef {
    pub collection: String,
    pub item_id: String,
    pub href: String,
    pub bands: BandMapping,
}

/// Read access to a catalog of forecast collections. Implemented by the
/// static-document backend and the STAC API backend; callers never need to
/// know which one is active.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn list_initialization_dates(&self, collection_id: &str) -> Result<BTreeSet<NaiveDate>>;

    async fn get_forecast_window(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
    ) -> Result<ForecastWindow>;

    async fn resolve_asset(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
        leadtime: u32,
    ) -> Result<AssetRef>;

    async fn get_band_mapping(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
    ) -> Result<BandMapping>;

    /// Drop anything memoised; the next call sees the catalog as it is now.
    async fn invalidate(&self) {}
}
