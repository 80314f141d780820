use super::{
    BandOption, DatePicker, Event, LeadtimeSlider, Output, Selection, SliderMark, TileLayer,
    Ticket,
};
use crate::catalog::CatalogReader;
use crate::error::Result;
use crate::tiler::{ColourStop, RescaleRange, TilerClient, build_tile_url};
use crate::utils::url::join_url;
use chrono::{Days, NaiveDate};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a layer recomputation decided for the map.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerUpdate {
    /// Fresh layers. Collections in `kept` failed transiently and keep the
    /// layer they already show.
    Replace {
        layers: Vec<TileLayer>,
        kept: Vec<String>,
    },
    /// Keep the layers of collections still selected.
    NoUpdate,
    /// No initialization date or no collection: take everything off the map.
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutcome {
    pub update: LayerUpdate,
    /// Union of the statistics of every freshly rendered asset, when any
    /// were fetched.
    pub auto_range: Option<RescaleRange>,
    /// Legend colours, or why the colormap could not be read. Nothing is
    /// committed without them.
    pub colorscale: std::result::Result<Vec<ColourStop>, String>,
}

/// Outputs recomputed for one ticket; `None` where the ticket did not ask.
#[derive(Debug, Default)]
pub struct Computed {
    pub dates: Option<DatePicker>,
    pub slider: Option<LeadtimeSlider>,
    pub bands: Option<Vec<BandOption>>,
    pub layers: Option<LayerOutcome>,
}

/// Recomputes derived outputs from a selection snapshot. Holds no
/// per-session state, so one engine serves every session.
pub struct Engine {
    catalog: Arc<dyn CatalogReader>,
    tiler: TilerClient,
    data_url: String,
    default_range: RescaleRange,
}

impl Engine {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        tiler: TilerClient,
        data_url: impl Into<String>,
        default_range: RescaleRange,
    ) -> Self {
        Self {
            catalog,
            tiler,
            data_url: data_url.into(),
            default_range,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogReader> {
        &self.catalog
    }

    pub fn tiler(&self) -> &TilerClient {
        &self.tiler
    }

    pub fn default_range(&self) -> RescaleRange {
        self.default_range
    }

    /// Checks that need the raster service, run before `event` touches the
    /// selection.
    pub async fn check(&self, event: &Event) -> Result<()> {
        if let Event::SetColormap(name) = event {
            self.tiler.colorscale(name).await?;
        }
        Ok(())
    }

    pub async fn compute(&self, ticket: &Ticket) -> Computed {
        let selection = &ticket.selection;
        let wants = |output: Output| ticket.outputs.contains(&output);

        let dates = async {
            if wants(Output::Dates) {
                Some(self.date_picker(&selection.collections).await)
            } else {
                None
            }
        };
        let slider = async {
            if wants(Output::Slider) {
                Some(
                    self.leadtime_slider(
                        &selection.collections,
                        selection.init_date,
                        selection.viewport_width,
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let bands = async {
            if wants(Output::Bands) {
                Some(self.bands(&selection.collections, selection.init_date).await)
            } else {
                None
            }
        };
        let layers = async {
            if wants(Output::Layers) {
                Some(self.layers(selection).await)
            } else {
                None
            }
        };

        let (dates, slider, bands, layers) = tokio::join!(dates, slider, bands, layers);
        Computed {
            dates,
            slider,
            bands,
            layers,
        }
    }

    /// Valid initialization dates across all collections and every other
    /// day between the first and last of them.
    pub async fn date_picker(&self, collections: &[String]) -> DatePicker {
        let results = join_all(
            collections
                .iter()
                .map(|c| self.catalog.list_initialization_dates(c)),
        )
        .await;

        let mut valid = BTreeSet::new();
        for (collection, result) in collections.iter().zip(results) {
            match result {
                Ok(dates) => valid.extend(dates),
                Err(e) => warn!(collection = %collection, error = %e, "Skipping collection dates"),
            }
        }

        let (Some(&min), Some(&max)) = (valid.first(), valid.last()) else {
            return DatePicker::default();
        };
        let disabled = min
            .iter_days()
            .take_while(|d| *d <= max)
            .filter(|d| !valid.contains(d))
            .collect();

        DatePicker {
            min_date: Some(min),
            max_date: Some(max),
            valid_dates: valid.into_iter().collect(),
            disabled_dates: disabled,
        }
    }

    /// Leadtimes run from 0 to the longest window among the collections,
    /// minus one. Marks thin out as the viewport narrows.
    pub async fn leadtime_slider(
        &self,
        collections: &[String],
        init_date: Option<NaiveDate>,
        viewport_width: u32,
    ) -> LeadtimeSlider {
        let disabled = LeadtimeSlider {
            disabled: true,
            ..LeadtimeSlider::default()
        };
        let Some(init_date) = init_date else {
            return disabled;
        };

        let windows = join_all(
            collections
                .iter()
                .map(|c| self.catalog.get_forecast_window(c, init_date)),
        )
        .await;

        let mut days = None;
        for (collection, window) in collections.iter().zip(windows) {
            match window {
                Ok(w) => days = days.max(Some(w.days())),
                Err(e) => debug!(
                    collection = %collection,
                    init_date = %init_date,
                    error = %e,
                    "No forecast window"
                ),
            }
        }
        let Some(max) = days.and_then(|d| d.checked_sub(1)) else {
            return disabled;
        };

        LeadtimeSlider {
            min: 0,
            max,
            marks: slider_marks(init_date, max + 1, viewport_width),
            disabled: false,
        }
    }

    /// Union of the band mappings, the first collection to name a band wins.
    pub async fn bands(
        &self,
        collections: &[String],
        init_date: Option<NaiveDate>,
    ) -> Vec<BandOption> {
        let Some(init_date) = init_date else {
            return Vec::new();
        };

        let mappings = join_all(
            collections
                .iter()
                .map(|c| self.catalog.get_band_mapping(c, init_date)),
        )
        .await;

        let mut options: Vec<BandOption> = Vec::new();
        for (collection, mapping) in collections.iter().zip(mappings) {
            let mapping = match mapping {
                Ok(m) => m,
                Err(e) => {
                    warn!(collection = %collection, init_date = %init_date, error = %e, "Skipping collection bands");
                    continue;
                }
            };
            for band in mapping.iter() {
                if !options.iter().any(|o| o.label == band.name) {
                    options.push(BandOption::from(band));
                }
            }
        }
        options
    }

    pub async fn layers(&self, selection: &Selection) -> LayerOutcome {
        let colorscale = match self.tiler.colorscale(&selection.colormap).await {
            Ok(colorscale) => colorscale,
            Err(e) => {
                warn!(colormap = %selection.colormap, error = %e, "Legend unavailable");
                return LayerOutcome {
                    update: LayerUpdate::NoUpdate,
                    auto_range: None,
                    colorscale: Err(e.to_string()),
                };
            }
        };
        let outcome = |update, auto_range| LayerOutcome {
            update,
            auto_range,
            colorscale: Ok(colorscale.clone()),
        };

        let Some(init_date) = selection.init_date else {
            return outcome(LayerUpdate::Clear, None);
        };
        if selection.collections.is_empty() {
            return outcome(LayerUpdate::Clear, None);
        }

        let results = join_all(
            selection
                .collections
                .iter()
                .enumerate()
                .map(|(index, collection)| self.collection_layer(index, collection, init_date, selection)),
        )
        .await;

        let mut layers = Vec::new();
        let mut ranges = Vec::new();
        let mut kept = Vec::new();
        for (collection, result) in selection.collections.iter().zip(results) {
            match result {
                Ok((layer, auto)) => {
                    layers.push(layer);
                    ranges.extend(auto);
                }
                Err(e) => {
                    if e.is_transient() {
                        kept.push(collection.clone());
                    }
                    warn!(
                        collection = %collection,
                        init_date = %init_date,
                        leadtime = selection.leadtime,
                        error = %e,
                        "Skipping collection layer"
                    );
                }
            }
        }

        if layers.is_empty() {
            return outcome(LayerUpdate::NoUpdate, None);
        }
        outcome(
            LayerUpdate::Replace { layers, kept },
            RescaleRange::combine(ranges),
        )
    }

    async fn collection_layer(
        &self,
        index: usize,
        collection: &str,
        init_date: NaiveDate,
        selection: &Selection,
    ) -> Result<(TileLayer, Option<RescaleRange>)> {
        let asset = self
            .catalog
            .resolve_asset(collection, init_date, selection.leadtime)
            .await?;
        let href = join_url(&self.data_url, &asset.href)?;

        let (rescale, auto) = if selection.fix_range {
            (selection.fixed_range(), None)
        } else {
            match self.tiler.band_statistics(&href, selection.band_index).await {
                Ok(range) => (range, Some(range)),
                Err(e) => {
                    warn!(
                        collection = %collection,
                        init_date = %init_date,
                        leadtime = selection.leadtime,
                        error = %e,
                        "Falling back to default range"
                    );
                    (self.default_range, None)
                }
            }
        };

        let url = build_tile_url(
            self.tiler.base(),
            &href,
            selection.band_index,
            rescale.min,
            rescale.max,
            &selection.colormap,
        )?;
        debug!(collection = %collection, url = %url, "Tile layer");

        Ok((
            TileLayer {
                name: collection.to_string(),
                index,
                url,
                asset_href: href,
                rescale,
                opacity: selection.opacity,
            },
            auto,
        ))
    }
}

/// `max(2, width / 100)` marks wanted, placed every `ceil(days / wanted)`
/// leadtimes and labelled with the date each leadtime falls on.
pub fn slider_marks(init_date: NaiveDate, days: u32, viewport_width: u32) -> Vec<SliderMark> {
    let wanted = (viewport_width / 100).max(2);
    let stride = days.div_ceil(wanted).max(1);
    (0..days)
        .step_by(stride as usize)
        .map(|value| SliderMark {
            value,
            label: init_date
                .checked_add_days(Days::new(value as u64))
                .map(|d| d.format("%d %b").to_string())
                .unwrap_or_else(|| value.to_string()),
        })
        .collect()
}
