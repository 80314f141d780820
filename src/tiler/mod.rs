//! Everything that talks to, or builds requests for, the raster service.

mod client;
pub mod colormap;
pub mod statistics;
pub mod url;

pub use client::TilerClient;
pub use colormap::ColourStop;
pub use url::build_tile_url;

use serde::Serialize;

/// Value range mapped onto the ends of a colormap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RescaleRange {
    pub min: f64,
    pub max: f64,
}

impl RescaleRange {
    /// Used when nothing better is known.
    pub const NEUTRAL: RescaleRange = RescaleRange { min: 0.0, max: 1.0 };

    pub fn new(min: f64, max: f64) -> Self {
        RescaleRange { min, max }
    }

    /// Smallest range covering both.
    pub fn union(self, other: RescaleRange) -> RescaleRange {
        RescaleRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of all ranges, `None` for an empty iterator.
    pub fn combine(ranges: impl IntoIterator<Item = RescaleRange>) -> Option<RescaleRange> {
        ranges.into_iter().reduce(RescaleRange::union)
    }
}
