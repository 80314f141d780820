//! Named colormaps and their legend colorscales.
//!
//! Colorscales are read from the raster service's `/colorMaps/{name}` tables,
//! the ones tiles are rendered with, and are never approximated locally. The
//! terminal swatch printed at startup is the only thing drawn from the local
//! `colorgrad` presets.

use super::TilerClient;
use crate::error::{Result, ViewerError};
use colorgrad::{Gradient, preset};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColourStop {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// 8-bit alpha scaled to `[0, 1]`
    pub alpha: f32,
}

impl fmt::Display for ColourStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({},{},{},{})",
            self.red, self.green, self.blue, self.alpha
        )
    }
}

impl From<[u8; 4]> for ColourStop {
    fn from([red, green, blue, alpha]: [u8; 4]) -> Self {
        ColourStop {
            red,
            green,
            blue,
            alpha: alpha as f32 / 255.0,
        }
    }
}

impl TilerClient {
    pub fn colormap_url(&self, name: &str) -> String {
        format!("{}/colorMaps/{}", self.base, name)
    }

    /// Every colormap name the raster service accepts, sorted.
    pub async fn colormap_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/colorMaps", self.base);
        let doc = self
            .get_cached(&url)
            .await
            .map_err(|e| ViewerError::raster_service_unavailable(&url, &e))?;
        parse_names(&doc).ok_or_else(|| ViewerError::RasterServiceUnavailable {
            url,
            message: "response has no colorMaps list".to_string(),
            transient: false,
        })
    }

    /// Ordered RGBA stops of colormap `name`, lowest value first.
    ///
    /// Names the service rejects are [`ViewerError::UnknownColormap`]; an
    /// unreachable service is reported as such and never replaced by a
    /// local guess.
    pub async fn colorscale(&self, name: &str) -> Result<Vec<ColourStop>> {
        if name.is_empty() || name.contains(['/', '?', '#', '&']) {
            return Err(ViewerError::UnknownColormap(name.to_string()));
        }

        let url = self.colormap_url(name);
        let doc = match self.get_cached(&url).await {
            Ok(doc) => doc,
            Err(e) if matches!(e.status(), Some(400 | 404 | 422)) => {
                return Err(ViewerError::UnknownColormap(name.to_string()));
            }
            Err(e) => return Err(ViewerError::raster_service_unavailable(&url, &e)),
        };

        let stops = parse_colormap(&doc).ok_or_else(|| ViewerError::RasterServiceUnavailable {
            url: url.clone(),
            message: "response is not an index to RGBA table".to_string(),
            transient: false,
        })?;
        debug!(colormap = %name, entries = stops.len(), "Colormap");
        Ok(stops)
    }
}

fn parse_names(body: &Value) -> Option<Vec<String>> {
    let list = body.get("colorMaps").unwrap_or(body).as_array()?;
    let mut names: Vec<String> = list
        .iter()
        .filter_map(|name| name.as_str().map(str::to_string))
        .collect();
    names.sort();
    Some(names)
}

/// `{"0": [r, g, b, a], "1": ..., "255": ...}`, ordered by numeric key.
fn parse_colormap(body: &Value) -> Option<Vec<ColourStop>> {
    let mut entries = body
        .as_object()?
        .iter()
        .map(|(key, rgba)| -> Option<(usize, ColourStop)> {
            let index: usize = key.parse().ok()?;
            let rgba = rgba.as_array()?;
            let channel = |i: usize| -> Option<u8> { u8::try_from(rgba.get(i)?.as_u64()?).ok() };
            let alpha = match rgba.get(3) {
                Some(_) => channel(3)?,
                None => u8::MAX,
            };
            Some((index, ColourStop::from([channel(0)?, channel(1)?, channel(2)?, alpha])))
        })
        .collect::<Option<Vec<_>>>()?;
    if entries.is_empty() {
        return None;
    }
    entries.sort_by_key(|(index, _)| *index);
    Some(entries.into_iter().map(|(_, stop)| stop).collect())
}

fn get_builtin_gradient(name: &str) -> Option<Box<dyn Gradient>> {
    Some(match name {
        "viridis" => Box::new(preset::viridis()),
        "magma" => Box::new(preset::magma()),
        "plasma" => Box::new(preset::plasma()),
        "inferno" => Box::new(preset::inferno()),
        "cividis" => Box::new(preset::cividis()),
        "turbo" => Box::new(preset::turbo()),
        "cubehelix" => Box::new(preset::cubehelix_default()),
        "spectral" => Box::new(preset::spectral()),
        "blues" => Box::new(preset::blues()),
        "greens" => Box::new(preset::greens()),
        "greys" => Box::new(preset::greys()),
        "oranges" => Box::new(preset::oranges()),
        "purples" => Box::new(preset::purples()),
        "reds" => Box::new(preset::reds()),
        "rdbu" => Box::new(preset::rd_bu()),
        "rdylbu" => Box::new(preset::rd_yl_bu()),
        "rdylgn" => Box::new(preset::rd_yl_gn()),
        "brbg" => Box::new(preset::br_bg()),
        "piyg" => Box::new(preset::pi_yg()),
        "prgn" => Box::new(preset::pr_gn()),
        "puor" => Box::new(preset::pu_or()),
        "rdgy" => Box::new(preset::rd_gy()),
        _ => return None,
    })
}

/// Terminal swatch approximating a colormap, `width` cells wide. `None`
/// for names without a local preset.
pub fn ansi_colourbar(name: &str, width: usize) -> Option<String> {
    let (base, reversed) = match name.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (name, false),
    };
    let gradient = get_builtin_gradient(base)?;
    let width = width.max(2);
    let mut bar = String::new();
    for i in 0..width {
        let t = i as f32 / (width - 1) as f32;
        let [r, g, b, _] = gradient.at(if reversed { 1.0 - t } else { t }).to_rgba8();
        bar.push_str(&format!("\x1b[38;2;{};{};{}m█\x1b[0m", r, g, b));
    }
    Some(bar)
}
