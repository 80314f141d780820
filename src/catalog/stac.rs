//! The subset of STAC documents the viewer reads.
//!
//! Catalogs, collections and items share one loose shape here: every field we
//! do not need is ignored and everything optional defaults, so legacy
//! catalogs and STAC API responses deserialize through the same structs.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A catalog or collection document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StacNode {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub extent: Option<Extent>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Extent {
    #[serde(default)]
    pub temporal: Option<TemporalExtent>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemporalExtent {
    #[serde(default)]
    pub interval: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Asset {
    pub href: String,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, rename = "forecast:bands")]
    pub bands: Vec<BandEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BandEntry {
    pub name: String,
    pub index: u32,
}

/// A page of items as returned by `/items` and `/search`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<Item>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CollectionList {
    #[serde(default)]
    pub collections: Vec<StacNode>,
}

impl StacNode {
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }

    /// Start and end of the first temporal interval, when both are set.
    pub fn temporal_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let interval = self.extent.as_ref()?.temporal.as_ref()?.interval.first()?;
        let start = parse_catalog_date(interval.first()?.as_deref()?)?;
        let end = parse_catalog_date(interval.get(1)?.as_deref()?)?;
        Some((start, end))
    }
}

impl ItemCollection {
    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

impl Item {
    /// Initialization date from `forecast:reference_time`, falling back to the
    /// legacy `forecast_start_date`.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        ["forecast:reference_time", "forecast_start_date"]
            .iter()
            .filter_map(|key| self.properties.get(*key)?.as_str())
            .find_map(parse_catalog_date)
    }

    /// Day offset of this forecast output, from the legacy integer `leadtime`
    /// or an ISO-8601 `forecast:leadtime` such as `P1D`.
    pub fn leadtime(&self) -> Option<u32> {
        if let Some(value) = self.properties.get("leadtime") {
            return value.as_u64().and_then(|v| u32::try_from(v).ok());
        }
        self.properties
            .get("forecast:leadtime")
            .and_then(Value::as_str)
            .and_then(parse_day_duration)
    }

    /// Declared number of lead-time days covered by the forecast this item
    /// belongs to.
    pub fn leadtime_length(&self) -> Option<u32> {
        match self.properties.get("forecast:leadtime_length")? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => parse_day_duration(s),
            _ => None,
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.properties
            .get("end_datetime")
            .and_then(Value::as_str)
            .and_then(parse_catalog_date)
    }

    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }
}

impl Asset {
    pub fn is_cog(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| t.starts_with("image/tiff"))
            .unwrap_or(false)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_catalog_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// Parses whole-day ISO-8601 durations (`P3D`, `P0D`).
pub fn parse_day_duration(value: &str) -> Option<u32> {
    value.strip_prefix('P')?.strip_suffix('D')?.parse().ok()
}

/// Timestamp form used for exact-match `forecast:reference_time` queries.
pub fn reference_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_catalog_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 11, 12).unwrap();
        assert_eq!(parse_catalog_date("2024-11-12"), Some(expected));
        assert_eq!(parse_catalog_date("2024-11-12T00:00:00Z"), Some(expected));
        assert_eq!(parse_catalog_date("2024-11-12T00:00:00.000000Z"), Some(expected));
        assert_eq!(parse_catalog_date("2024-11-12T06:30:00"), Some(expected));
        assert_eq!(parse_catalog_date("12/11/2024"), None);
    }

    #[test]
    fn test_item_properties_accept_legacy_and_forecast_extension() {
        let legacy: Item = serde_json::from_value(json!({
            "id": "a",
            "properties": {"forecast_start_date": "2024-11-12", "leadtime": 2}
        }))
        .unwrap();
        assert_eq!(legacy.reference_date(), NaiveDate::from_ymd_opt(2024, 11, 12));
        assert_eq!(legacy.leadtime(), Some(2));

        let modern: Item = serde_json::from_value(json!({
            "id": "b",
            "properties": {
                "forecast:reference_time": "2024-11-12T00:00:00Z",
                "forecast:leadtime": "P1D",
                "forecast:leadtime_length": "P3D"
            }
        }))
        .unwrap();
        assert_eq!(modern.reference_date(), NaiveDate::from_ymd_opt(2024, 11, 12));
        assert_eq!(modern.leadtime(), Some(1));
        assert_eq!(modern.leadtime_length(), Some(3));
    }

    #[test]
    fn test_temporal_window_from_collection_extent() {
        let node: StacNode = serde_json::from_value(json!({
            "id": "north-2024-11-12",
            "type": "Collection",
            "extent": {"temporal": {"interval": [["2024-11-12T00:00:00Z", "2024-11-15T00:00:00Z"]]}},
            "links": [{"rel": "item", "href": "./a.json"}]
        }))
        .unwrap();
        let (start, end) = node.temporal_window().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 11, 12).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 11, 15).unwrap());
        assert_eq!(node.links_with_rel("item").count(), 1);
    }

    #[test]
    fn test_open_ended_interval_has_no_window() {
        let node: StacNode = serde_json::from_value(json!({
            "id": "x",
            "extent": {"temporal": {"interval": [["2024-11-12T00:00:00Z", null]]}}
        }))
        .unwrap();
        assert!(node.temporal_window().is_none());
    }

    #[test]
    fn test_band_entries_parse() {
        let asset: Asset = serde_json::from_value(json!({
            "href": "leadtime-1.tif",
            "type": "image/tiff; application=geotiff; profile=cloud-optimized",
            "roles": ["data"],
            "forecast:bands": [{"name": "SIC Mean", "index": 0}, {"name": "SIC Stddev", "index": 1}]
        }))
        .unwrap();
        assert!(asset.is_cog());
        assert!(asset.has_role("data"));
        assert_eq!(asset.bands[1], BandEntry { name: "SIC Stddev".into(), index: 1 });
    }
}
