//! Forecast-window logic shared by every catalog backend.
//!
//! Whatever the catalog shape, resolution ends with a [`ForecastGroup`]: the
//! items belonging to one initialization date of one collection, plus the
//! window end when the catalog states it explicitly.

use super::stac::{Asset, Item};
use super::{AssetRef, BandMapping, ForecastWindow};
use crate::error::{Result, ViewerError};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ForecastGroup {
    pub collection: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub items: Vec<Item>,
}

/// Group a flat item list by initialization date.
pub fn group_by_reference_date(
    collection: &str,
    items: Vec<Item>,
) -> BTreeMap<NaiveDate, ForecastGroup> {
    let mut groups: BTreeMap<NaiveDate, ForecastGroup> = BTreeMap::new();
    for item in items {
        let Some(start) = item.reference_date() else {
            continue;
        };
        groups
            .entry(start)
            .or_insert_with(|| ForecastGroup {
                collection: collection.to_string(),
                start,
                end: None,
                items: Vec::new(),
            })
            .items
            .push(item);
    }
    groups
}

impl ForecastGroup {
    /// The window end comes from, in order: the enclosing collection's
    /// temporal extent, a declared `forecast:leadtime_length`, an item
    /// `end_datetime`, and finally the highest leadtime present.
    pub fn window(&self) -> Result<ForecastWindow> {
        let end = self
            .end
            .or_else(|| {
                self.items
                    .iter()
                    .find_map(|i| i.leadtime_length())
                    .and_then(|days| self.start.checked_add_days(Days::new(days as u64)))
            })
            .or_else(|| self.items.iter().find_map(|i| i.end_date()))
            .or_else(|| {
                self.items
                    .iter()
                    .filter_map(|i| i.leadtime())
                    .max()
                    .and_then(|lt| self.start.checked_add_days(Days::new(lt as u64 + 1)))
            })
            .ok_or_else(|| ViewerError::ForecastWindowNotFound {
                collection: self.collection.clone(),
                init_date: self.start,
            })?;

        Ok(ForecastWindow {
            start: self.start,
            end,
        })
    }

    /// The single item for `leadtime`. Items without any leadtime property
    /// are time-series items covering the whole window; one of those is
    /// accepted for any leadtime inside the window.
    pub fn select_item(&self, leadtime: u32) -> Result<&Item> {
        let matches: Vec<&Item> = self
            .items
            .iter()
            .filter(|i| i.leadtime() == Some(leadtime))
            .collect();

        match matches.len() {
            1 => return Ok(matches[0]),
            0 => {}
            count => {
                return Err(ViewerError::AmbiguousMatch {
                    collection: self.collection.clone(),
                    init_date: self.start,
                    leadtime: Some(leadtime),
                    what: "items",
                    count,
                });
            }
        }

        let series: Vec<&Item> = self
            .items
            .iter()
            .filter(|i| i.leadtime().is_none())
            .collect();
        if series.len() == self.items.len() && series.len() > 1 {
            return Err(ViewerError::AmbiguousMatch {
                collection: self.collection.clone(),
                init_date: self.start,
                leadtime: Some(leadtime),
                what: "time-series items",
                count: series.len(),
            });
        }
        if series.len() == 1 && self.items.len() == 1 {
            let in_window = self
                .window()
                .map(|w| leadtime < w.days())
                .unwrap_or(false);
            if in_window {
                return Ok(series[0]);
            }
        }

        Err(self.not_found(Some(leadtime), "item"))
    }

    pub fn asset_ref(&self, leadtime: u32) -> Result<AssetRef> {
        let item = self.select_item(leadtime)?;
        let asset =
            data_asset(item).ok_or_else(|| self.not_found(Some(leadtime), "data asset"))?;

        Ok(AssetRef {
            collection: self.collection.clone(),
            item_id: item.id.clone(),
            href: asset.href.clone(),
            bands: BandMapping::from(asset.bands.clone()),
        })
    }

    /// Band metadata of the earliest-leadtime item. Assets without
    /// `forecast:bands` are single-band and give an empty mapping.
    pub fn band_mapping(&self) -> Result<BandMapping> {
        let first = self
            .items
            .iter()
            .min_by_key(|i| i.leadtime().unwrap_or(0))
            .ok_or_else(|| self.not_found(None, "items"))?;
        Ok(data_asset(first)
            .map(|asset| BandMapping::from(asset.bands.clone()))
            .unwrap_or_default())
    }

    fn not_found(&self, leadtime: Option<u32>, what: &'static str) -> ViewerError {
        ViewerError::NotFound {
            collection: self.collection.clone(),
            init_date: self.start,
            leadtime,
            what,
        }
    }
}

/// The raster an item is rendered from: a COG with the `data` role, then any
/// `data` asset, then the legacy `geotiff` key, then any COG.
pub fn data_asset(item: &Item) -> Option<&Asset> {
    let assets = || item.assets.values();
    assets()
        .find(|a| a.has_role("data") && a.is_cog())
        .or_else(|| assets().find(|a| a.has_role("data")))
        .or_else(|| item.assets.get("geotiff"))
        .or_else(|| assets().find(|a| a.is_cog()))
}
