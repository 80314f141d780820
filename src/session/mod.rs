//! Per-user selection state and the outputs derived from it.
//!
//! A [`Session`] owns the user's [`Selection`]. Each [`Event`] mutates the
//! selection and names the derived outputs it invalidates; the [`Engine`]
//! recomputes exactly those against the catalog and raster service, and the
//! session commits them unless a newer event has invalidated them since.

use crate::catalog::BandEntry;
use crate::error::{Result, ViewerError};
use crate::tiler::{ColourStop, RescaleRange};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod engine;
pub mod state;

pub use engine::Engine;
pub use state::{Patch, Session, Ticket};

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1000;

/// Everything the user can set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selection order matters: earlier collections win band-name clashes.
    pub collections: Vec<String>,
    pub init_date: Option<NaiveDate>,
    pub leadtime: u32,
    pub band_index: u32,
    pub colormap: String,
    pub opacity: f64,
    pub fix_range: bool,
    pub fixed_min: f64,
    pub fixed_max: f64,
    pub viewport_width: u32,
}

impl Selection {
    pub fn new(colormap: impl Into<String>, range: RescaleRange) -> Self {
        Selection {
            collections: Vec::new(),
            init_date: None,
            leadtime: 0,
            band_index: 0,
            colormap: colormap.into(),
            opacity: 1.0,
            fix_range: false,
            fixed_min: range.min,
            fixed_max: range.max,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
        }
    }

    /// The fixed bounds, lower first whichever input holds it.
    pub fn fixed_range(&self) -> RescaleRange {
        RescaleRange::new(
            self.fixed_min.min(self.fixed_max),
            self.fixed_min.max(self.fixed_max),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Event {
    SetCollections(Vec<String>),
    SetInitDate(Option<NaiveDate>),
    SetLeadtime(u32),
    SetBand(u32),
    SetColormap(String),
    SetOpacity(f64),
    ToggleFixRange,
    SetFixedMin(f64),
    SetFixedMax(f64),
    Resize(u32),
}

/// A derived output that can be invalidated and recomputed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    Dates,
    Slider,
    Bands,
    /// Tile layers together with the legend and range inputs they determine.
    Layers,
    Opacity,
}

impl Output {
    pub const ALL: [Output; 5] = [
        Output::Dates,
        Output::Slider,
        Output::Bands,
        Output::Layers,
        Output::Opacity,
    ];
}

impl Event {
    /// Check the event and apply it to `selection`, returning the outputs
    /// that now need recomputing. The selection is untouched on error.
    pub fn apply(&self, selection: &mut Selection) -> Result<&'static [Output]> {
        use Output::*;

        Ok(match self {
            Event::SetCollections(collections) => {
                let mut unique: Vec<String> = Vec::with_capacity(collections.len());
                for c in collections {
                    if !unique.contains(c) {
                        unique.push(c.clone());
                    }
                }
                selection.collections = unique;
                &[Dates, Slider, Bands, Layers]
            }
            Event::SetInitDate(date) => {
                selection.init_date = *date;
                &[Slider, Bands, Layers]
            }
            Event::SetLeadtime(leadtime) => {
                selection.leadtime = *leadtime;
                &[Layers]
            }
            Event::SetBand(index) => {
                selection.band_index = *index;
                &[Layers]
            }
            Event::SetColormap(name) => {
                if name.trim().is_empty() {
                    return Err(ViewerError::UnknownColormap(name.clone()));
                }
                selection.colormap = name.clone();
                &[Layers]
            }
            Event::SetOpacity(opacity) => {
                if !(0.0..=1.0).contains(opacity) {
                    return Err(ViewerError::InvalidEvent(format!(
                        "opacity {} outside [0, 1]",
                        opacity
                    )));
                }
                selection.opacity = *opacity;
                &[Opacity]
            }
            Event::ToggleFixRange => {
                selection.fix_range = !selection.fix_range;
                &[Layers]
            }
            Event::SetFixedMin(value) | Event::SetFixedMax(value) => {
                if !selection.fix_range {
                    return Err(ViewerError::InvalidEvent(
                        "range inputs are disabled while the range is automatic".to_string(),
                    ));
                }
                if !value.is_finite() {
                    return Err(ViewerError::InvalidEvent(format!(
                        "range bound {} is not a number",
                        value
                    )));
                }
                if matches!(self, Event::SetFixedMin(_)) {
                    selection.fixed_min = *value;
                } else {
                    selection.fixed_max = *value;
                }
                &[Layers]
            }
            Event::Resize(width) => {
                selection.viewport_width = *width;
                &[Slider]
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatePicker {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub valid_dates: Vec<NaiveDate>,
    pub disabled_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliderMark {
    pub value: u32,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadtimeSlider {
    pub min: u32,
    pub max: u32,
    pub marks: Vec<SliderMark>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandOption {
    pub label: String,
    pub value: u32,
}

impl From<&BandEntry> for BandOption {
    fn from(band: &BandEntry) -> Self {
        BandOption {
            label: band.name.clone(),
            value: band.index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayer {
    /// Collection id, shown in the layer control.
    pub name: String,
    /// Position of the collection in the selection.
    pub index: usize,
    pub url: String,
    pub asset_href: String,
    pub rescale: RescaleRange,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub colormap: String,
    pub colorscale: Vec<ColourStop>,
    pub min: f64,
    pub max: f64,
}

/// The fixed-range inputs: editable only while the range is fixed,
/// otherwise showing the last automatic range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeInputs {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::catalog::{AssetRef, BandEntry, BandMapping, CatalogReader, ForecastWindow};
    use crate::error::{Result, ViewerError};
    use async_trait::async_trait;
    use chrono::{Days, NaiveDate};
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    pub fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    #[derive(Clone)]
    struct Window {
        days: u32,
        bands: Vec<BandEntry>,
    }

    /// In-memory catalog: collections with forecast windows, every window
    /// holding one asset per leadtime at `{collection}/{date}/{leadtime}.tif`.
    #[derive(Default)]
    pub struct MemoryCatalog {
        order: Vec<String>,
        windows: HashMap<(String, NaiveDate), Window>,
        offline: BTreeSet<String>,
        /// Leadtime whose resolution is slowed down
        pub slow_leadtime: Option<(u32, Duration)>,
    }

    impl MemoryCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_window(
            mut self,
            collection: &str,
            start: NaiveDate,
            days: u32,
            bands: &[(&str, u32)],
        ) -> Self {
            if !self.order.iter().any(|c| c == collection) {
                self.order.push(collection.to_string());
            }
            let bands = bands
                .iter()
                .map(|(name, index)| BandEntry {
                    name: name.to_string(),
                    index: *index,
                })
                .collect();
            self.windows
                .insert((collection.to_string(), start), Window { days, bands });
            self
        }

        /// Every collection added so far answers with a transient outage.
        pub fn offline(mut self) -> Self {
            self.offline.extend(self.order.iter().cloned());
            self
        }

        pub fn offline_collection(mut self, collection: &str) -> Self {
            self.offline.insert(collection.to_string());
            self
        }

        fn window(&self, collection: &str, init_date: NaiveDate) -> Result<&Window> {
            if self.offline.contains(collection) {
                return Err(ViewerError::CatalogUnavailable {
                    location: "memory".into(),
                    message: "offline".into(),
                    transient: true,
                });
            }
            if !self.order.iter().any(|c| c == collection) {
                return Err(ViewerError::CollectionNotFound(collection.to_string()));
            }
            self.windows
                .get(&(collection.to_string(), init_date))
                .ok_or_else(|| ViewerError::ForecastWindowNotFound {
                    collection: collection.to_string(),
                    init_date,
                })
        }
    }

    #[async_trait]
    impl CatalogReader for MemoryCatalog {
        async fn list_collections(&self) -> Result<Vec<String>> {
            Ok(self.order.clone())
        }

        async fn list_initialization_dates(&self, collection: &str) -> Result<BTreeSet<NaiveDate>> {
            if !self.order.iter().any(|c| c == collection) {
                return Err(ViewerError::CollectionNotFound(collection.to_string()));
            }
            Ok(self
                .windows
                .keys()
                .filter(|(c, _)| c == collection)
                .map(|(_, d)| *d)
                .collect())
        }

        async fn get_forecast_window(
            &self,
            collection: &str,
            init_date: NaiveDate,
        ) -> Result<ForecastWindow> {
            let window = self.window(collection, init_date)?;
            Ok(ForecastWindow {
                start: init_date,
                end: init_date + Days::new(window.days as u64),
            })
        }

        async fn resolve_asset(
            &self,
            collection: &str,
            init_date: NaiveDate,
            leadtime: u32,
        ) -> Result<AssetRef> {
            if let Some((slow, delay)) = self.slow_leadtime {
                if slow == leadtime {
                    tokio::time::sleep(delay).await;
                }
            }
            let window = self.window(collection, init_date)?;
            if leadtime >= window.days {
                return Err(ViewerError::NotFound {
                    collection: collection.to_string(),
                    init_date,
                    leadtime: Some(leadtime),
                    what: "item",
                });
            }
            Ok(AssetRef {
                collection: collection.to_string(),
                item_id: format!("{}-{}", init_date, leadtime),
                href: format!("{}/{}/{}.tif", collection, init_date, leadtime),
                bands: BandMapping::from(window.bands.clone()),
            })
        }

        async fn get_band_mapping(
            &self,
            collection: &str,
            init_date: NaiveDate,
        ) -> Result<BandMapping> {
            Ok(BandMapping::from(self.window(collection, init_date)?.bands.clone()))
        }
    }
}
