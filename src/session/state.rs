use super::engine::{Computed, LayerOutcome, LayerUpdate};
use super::{
    BandOption, DatePicker, Event, LeadtimeSlider, Legend, Output, RangeInputs, Selection,
    TileLayer,
};
use crate::error::Result;
use crate::tiler::RescaleRange;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// A selection snapshot handed to the engine, stamped with the sequence
/// number of the event that produced it.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub seq: u64,
    pub selection: Selection,
    pub outputs: Vec<Output>,
}

/// Last committed value of every derived output.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedState {
    pub dates: DatePicker,
    pub slider: LeadtimeSlider,
    pub bands: Vec<BandOption>,
    pub layers: Vec<TileLayer>,
    pub auto_range: Option<RescaleRange>,
    pub legend: Legend,
    pub range_inputs: RangeInputs,
}

/// Outputs committed by one event. Absent fields did not change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Patch {
    pub seq: u64,
    /// Set when a newer event superseded everything this one computed.
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<DatePicker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slider: Option<LeadtimeSlider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<BandOption>>,
    /// An empty list takes every layer off the map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<TileLayer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_inputs: Option<RangeInputs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Why layers and legend were left as they are, when that was not the
    /// catalog's doing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Patch {
    fn is_empty(&self) -> bool {
        self.dates.is_none()
            && self.slider.is_none()
            && self.bands.is_none()
            && self.layers.is_none()
            && self.legend.is_none()
            && self.range_inputs.is_none()
            && self.opacity.is_none()
    }
}

pub struct Session {
    selection: Selection,
    seq: u64,
    /// Sequence of the event that last invalidated each output.
    invalidated_by: HashMap<Output, u64>,
    state: DerivedState,
    neutral: RescaleRange,
}

impl Session {
    pub fn new(selection: Selection) -> Self {
        let neutral = RescaleRange::new(selection.fixed_min, selection.fixed_max);
        let state = DerivedState {
            dates: DatePicker::default(),
            slider: LeadtimeSlider {
                disabled: true,
                ..LeadtimeSlider::default()
            },
            bands: Vec::new(),
            layers: Vec::new(),
            auto_range: None,
            legend: Legend {
                colormap: selection.colormap.clone(),
                colorscale: Vec::new(),
                min: neutral.min,
                max: neutral.max,
            },
            range_inputs: RangeInputs {
                enabled: selection.fix_range,
                min: neutral.min,
                max: neutral.max,
            },
        };
        Session {
            selection,
            seq: 0,
            invalidated_by: HashMap::new(),
            state,
            neutral,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> &DerivedState {
        &self.state
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Ticket recomputing every output, for a freshly created session.
    pub fn begin_all(&mut self) -> Ticket {
        self.stamp(&Output::ALL)
    }

    /// Apply `event` to the selection and stamp the outputs it invalidates.
    /// Rejected events change nothing.
    pub fn begin(&mut self, event: Event) -> Result<Ticket> {
        let outputs = event.apply(&mut self.selection)?;
        debug!(seq = self.seq + 1, event = ?event, "Session event");
        Ok(self.stamp(outputs))
    }

    fn stamp(&mut self, outputs: &[Output]) -> Ticket {
        self.seq += 1;
        for output in outputs {
            self.invalidated_by.insert(*output, self.seq);
        }
        Ticket {
            seq: self.seq,
            selection: self.selection.clone(),
            outputs: outputs.to_vec(),
        }
    }

    fn is_current(&self, ticket: &Ticket, output: Output) -> bool {
        ticket.outputs.contains(&output) && self.invalidated_by.get(&output) == Some(&ticket.seq)
    }

    /// Store the outputs of `ticket` that no newer event has invalidated
    /// and return them as a patch.
    pub fn commit(&mut self, ticket: Ticket, computed: Computed) -> Patch {
        let mut patch = Patch {
            seq: ticket.seq,
            ..Patch::default()
        };

        if let Some(dates) = computed.dates.filter(|_| self.is_current(&ticket, Output::Dates)) {
            self.state.dates = dates.clone();
            patch.dates = Some(dates);
        }
        if let Some(slider) = computed.slider.filter(|_| self.is_current(&ticket, Output::Slider)) {
            self.state.slider = slider.clone();
            patch.slider = Some(slider);
        }
        if let Some(bands) = computed.bands.filter(|_| self.is_current(&ticket, Output::Bands)) {
            self.state.bands = bands.clone();
            patch.bands = Some(bands);
        }
        if let Some(outcome) = computed.layers.filter(|_| self.is_current(&ticket, Output::Layers)) {
            self.commit_layers(&ticket, outcome, &mut patch);
        }
        if self.is_current(&ticket, Output::Opacity) {
            let opacity = ticket.selection.opacity;
            for layer in &mut self.state.layers {
                layer.opacity = opacity;
            }
            patch.opacity = Some(opacity);
        }

        patch.stale = patch.is_empty() && patch.error.is_none() && !ticket.outputs.is_empty();
        if patch.stale {
            debug!(seq = ticket.seq, latest = self.seq, "Discarding stale results");
        }
        patch
    }

    fn commit_layers(&mut self, ticket: &Ticket, outcome: LayerOutcome, patch: &mut Patch) {
        let colorscale = match outcome.colorscale {
            Ok(colorscale) => colorscale,
            Err(message) => {
                patch.error = Some(message);
                return;
            }
        };
        let selection = &ticket.selection;

        let bounds = match outcome.update {
            LayerUpdate::Replace { mut layers, kept } => {
                for previous in &self.state.layers {
                    if !kept.contains(&previous.name) {
                        continue;
                    }
                    if let Some(index) = selection.collections.iter().position(|c| *c == previous.name) {
                        layers.push(TileLayer {
                            index,
                            ..previous.clone()
                        });
                    }
                }
                layers.sort_by_key(|layer| layer.index);
                for layer in &mut layers {
                    layer.opacity = self.selection.opacity;
                }
                self.state.layers = layers.clone();
                patch.layers = Some(layers);
                if selection.fix_range {
                    selection.fixed_range()
                } else {
                    self.state.auto_range = outcome.auto_range;
                    outcome.auto_range.unwrap_or(self.neutral)
                }
            }
            LayerUpdate::Clear => {
                self.state.layers.clear();
                self.state.auto_range = None;
                patch.layers = Some(Vec::new());
                self.neutral
            }
            LayerUpdate::NoUpdate => {
                let shown = self.state.layers.len();
                self.state
                    .layers
                    .retain(|layer| selection.collections.contains(&layer.name));
                if self.state.layers.len() != shown {
                    patch.layers = Some(self.state.layers.clone());
                }
                RescaleRange::new(self.state.legend.min, self.state.legend.max)
            }
        };

        if !selection.fix_range {
            // Automatic mode: the disabled inputs mirror the range in use.
            let shown = self.state.auto_range.unwrap_or(bounds);
            self.selection.fixed_min = shown.min;
            self.selection.fixed_max = shown.max;
        }
        self.state.range_inputs = RangeInputs {
            enabled: selection.fix_range,
            min: self.selection.fixed_min,
            max: self.selection.fixed_max,
        };
        self.state.legend = Legend {
            colormap: selection.colormap.clone(),
            colorscale,
            min: bounds.min,
            max: bounds.max,
        };
        patch.legend = Some(self.state.legend.clone());
        patch.range_inputs = Some(self.state.range_inputs);
    }
}
