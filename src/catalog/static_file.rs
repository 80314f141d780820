//! Catalog backend for a pre-generated STAC tree (`catalog.json` and the
//! documents it links to), read from a URL or from the local filesystem.
//!
//! A collection either links one sub-collection per forecast window (whose
//! temporal extent gives the window) or links its items directly, in which
//! case items are grouped by their reference time.

use super::forecast::{ForecastGroup, group_by_reference_date};
use super::stac::{Item, StacNode};
use super::{AssetRef, BandMapping, CatalogReader, ForecastWindow};
use crate::error::{Result, ViewerError};
use crate::transport::{Transport, TransportError};
use crate::utils::url::{is_url, resolve_relative};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::try_join_all;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct StaticCatalog {
    root: String,
    transport: Arc<dyn Transport>,
    documents: Cache<String, Arc<Value>>,
}

impl StaticCatalog {
    pub fn new(root: impl Into<String>, transport: Arc<dyn Transport>, ttl: Duration) -> Self {
        let documents = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self {
            root: root.into(),
            transport,
            documents,
        }
    }

    async fn fetch(&self, location: &str) -> std::result::Result<Arc<Value>, TransportError> {
        if let Some(doc) = self.documents.get(location).await {
            return Ok(doc);
        }

        let doc = if is_url(location) {
            self.transport.get_json(location).await?
        } else {
            let text = tokio::fs::read_to_string(location)
                .await
                .map_err(|e| TransportError::Io {
                    path: location.to_string(),
                    message: e.to_string(),
                })?;
            serde_json::from_str(&text).map_err(|e| TransportError::Decode {
                url: location.to_string(),
                message: e.to_string(),
            })?
        };

        debug!(location = %location, "Loaded catalog document");
        let doc = Arc::new(doc);
        self.documents
            .insert(location.to_string(), doc.clone())
            .await;
        Ok(doc)
    }

    async fn load<T: DeserializeOwned>(&self, location: &str) -> Result<T> {
        let doc = self
            .fetch(location)
            .await
            .map_err(|e| ViewerError::catalog_unavailable(location, &e))?;
        T::deserialize(doc.as_ref()).map_err(|e| ViewerError::CatalogUnavailable {
            location: location.to_string(),
            message: e.to_string(),
            transient: false,
        })
    }

    /// Collections linked from the root, with their document locations.
    async fn collections(&self) -> Result<Vec<(String, StacNode)>> {
        let root: StacNode = self.load(&self.root).await?;
        let locations = root
            .links_with_rel("child")
            .map(|link| resolve_relative(&self.root, &link.href))
            .collect::<Result<Vec<_>>>()?;

        try_join_all(locations.into_iter().map(|location| async move {
            let node: StacNode = self.load(&location).await?;
            Ok::<_, ViewerError>((location, node))
        }))
        .await
    }

    async fn collection(&self, collection_id: &str) -> Result<(String, StacNode)> {
        self.collections()
            .await?
            .into_iter()
            .find(|(_, node)| node.id == collection_id)
            .ok_or_else(|| ViewerError::CollectionNotFound(collection_id.to_string()))
    }

    async fn items(&self, location: &str, node: &StacNode) -> Result<Vec<Item>> {
        let locations = node
            .links_with_rel("item")
            .map(|link| resolve_relative(location, &link.href))
            .collect::<Result<Vec<_>>>()?;
        try_join_all(locations.iter().map(|l| self.load::<Item>(l))).await
    }

    /// Every forecast window of a collection, in catalog order.
    async fn groups(&self, collection_id: &str) -> Result<Vec<ForecastGroup>> {
        let (location, node) = self.collection(collection_id).await?;

        let mut groups = Vec::new();
        for link in node.links_with_rel("child") {
            let child_location = resolve_relative(&location, &link.href)?;
            let child: StacNode = self.load(&child_location).await?;
            let items = self.items(&child_location, &child).await?;

            let window = child.temporal_window();
            let start = window
                .map(|(start, _)| start)
                .or_else(|| items.iter().filter_map(Item::reference_date).min());
            let Some(start) = start else {
                debug!(collection = %collection_id, child = %child.id, "Skipping undated forecast collection");
                continue;
            };
            groups.push(ForecastGroup {
                collection: collection_id.to_string(),
                start,
                end: window.map(|(_, end)| end),
                items,
            });
        }

        let flat = self.items(&location, &node).await?;
        groups.extend(group_by_reference_date(collection_id, flat).into_values());
        Ok(groups)
    }

    /// The one forecast window starting exactly on `init_date`.
    async fn group(&self, collection_id: &str, init_date: NaiveDate) -> Result<ForecastGroup> {
        let mut matching: Vec<ForecastGroup> = self
            .groups(collection_id)
            .await?
            .into_iter()
            .filter(|g| g.start == init_date)
            .collect();

        match matching.len() {
            0 => Err(ViewerError::ForecastWindowNotFound {
                collection: collection_id.to_string(),
                init_date,
            }),
            1 => Ok(matching.remove(0)),
            count => Err(ViewerError::AmbiguousMatch {
                collection: collection_id.to_string(),
                init_date,
                leadtime: None,
                what: "forecast windows",
                count,
            }),
        }
    }
}

#[async_trait]
impl CatalogReader for StaticCatalog {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .collections()
            .await?
            .into_iter()
            .map(|(_, node)| node.id)
            .collect())
    }

    async fn list_initialization_dates(&self, collection_id: &str) -> Result<BTreeSet<NaiveDate>> {
        Ok(self
            .groups(collection_id)
            .await?
            .iter()
            .map(|g| g.start)
            .collect())
    }

    async fn get_forecast_window(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
    ) -> Result<ForecastWindow> {
        self.group(collection_id, init_date).await?.window()
    }

    async fn resolve_asset(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
        leadtime: u32,
    ) -> Result<AssetRef> {
        self.group(collection_id, init_date)
            .await?
            .asset_ref(leadtime)
    }

    async fn get_band_mapping(
        &self,
        collection_id: &str,
        init_date: NaiveDate,
    ) -> Result<BandMapping> {
        self.group(collection_id, init_date).await?.band_mapping()
    }

    async fn invalidate(&self) {
        self.documents.invalidate_all();
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{ROOT, hierarchical_catalog};
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn catalog(mock: Arc<MockTransport>) -> StaticCatalog {
        StaticCatalog::new(ROOT, mock, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_list_collections_in_catalog_order() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        assert_eq!(catalog.list_collections().await.unwrap(), vec!["north", "south"]);
        assert_eq!(catalog.list_collections().await.unwrap(), vec!["north", "south"]);
    }

    #[tokio::test]
    async fn test_initialization_dates_per_collection() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        let dates = catalog.list_initialization_dates("north").await.unwrap();
        assert_eq!(dates.into_iter().collect::<Vec<_>>(), vec![date(11, 12), date(11, 15)]);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        let err = catalog.list_initialization_dates("east").await.unwrap_err();
        assert!(matches!(err, ViewerError::CollectionNotFound(id) if id == "east"));
    }

    #[tokio::test]
    async fn test_unreachable_catalog() {
        let catalog = catalog(Arc::new(MockTransport::new().with_status(ROOT, 503)));
        let err = catalog.list_collections().await.unwrap_err();
        assert!(matches!(err, ViewerError::CatalogUnavailable { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_forecast_window_uses_sub_collection_extent() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        let window = catalog.get_forecast_window("north", date(11, 12)).await.unwrap();
        assert_eq!(window.end, date(11, 15));
        assert_eq!(window.max_leadtime(), Some(2));

        let err = catalog
            .get_forecast_window("north", date(11, 13))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::ForecastWindowNotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_asset_exact_date_and_leadtime() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        let asset = catalog.resolve_asset("north", date(11, 12), 1).await.unwrap();
        assert_eq!(asset.href, "forecast-2024-11-12/leadtime-1.tif");
        assert_eq!(asset.collection, "north");

        let err = catalog
            .resolve_asset("north", date(11, 12), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_band_mapping_from_asset_metadata() {
        let catalog = catalog(Arc::new(hierarchical_catalog()));
        let bands = catalog.get_band_mapping("south", date(11, 13)).await.unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands.index_of("SIC Mean"), Some(0));
        assert_eq!(bands.index_of("SIC Stddev"), Some(1));
    }

    #[tokio::test]
    async fn test_documents_are_memoised_until_invalidated() {
        let mock = Arc::new(hierarchical_catalog());
        let catalog = catalog(mock.clone());

        catalog.list_collections().await.unwrap();
        catalog.list_collections().await.unwrap();
        assert_eq!(mock.count_matching(ROOT), 1);

        catalog.invalidate().await;
        catalog.list_collections().await.unwrap();
        assert_eq!(mock.count_matching(ROOT), 2);
    }

    #[tokio::test]
    async fn test_duplicate_windows_are_ambiguous() {
        let mock = MockTransport::new()
            .with_json(
                ROOT,
                json!({"id": "c", "links": [{"rel": "child", "href": "./north.json"}]}),
            )
            .with_json(
                "http://data/stac/north.json",
                json!({"id": "north", "links": [
                    {"rel": "child", "href": "./a.json"},
                    {"rel": "child", "href": "./b.json"}
                ]}),
            )
            .with_json(
                "http://data/stac/a.json",
                json!({"id": "a", "extent": {"temporal": {"interval": [["2024-11-12", "2024-11-14"]]}}}),
            )
            .with_json(
                "http://data/stac/b.json",
                json!({"id": "b", "extent": {"temporal": {"interval": [["2024-11-12", "2024-11-14"]]}}}),
            );
        let catalog = catalog(Arc::new(mock));
        let err = catalog
            .resolve_asset("north", date(11, 12), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::AmbiguousMatch { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_flat_collection_from_local_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("catalog.json");
        std::fs::create_dir_all(tmp.path().join("south")).unwrap();
        std::fs::write(
            &root,
            json!({"id": "local", "links": [{"rel": "child", "href": "./south/collection.json"}]})
                .to_string(),
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("south/collection.json"),
            json!({"id": "south", "links": [
                {"rel": "item", "href": "./a.json"},
                {"rel": "item", "href": "./b.json"}
            ]})
            .to_string(),
        )
        .unwrap();
        for (name, leadtime) in [("a", 0), ("b", 1)] {
            std::fs::write(
                tmp.path().join(format!("south/{name}.json")),
                json!({
                    "id": name,
                    "properties": {
                        "forecast:reference_time": "2024-11-12T00:00:00Z",
                        "forecast:leadtime": format!("P{leadtime}D"),
                        "forecast:leadtime_length": "P2D"
                    },
                    "assets": {"data": {"href": format!("south/{name}.tif"), "roles": ["data"]}}
                })
                .to_string(),
            )
            .unwrap();
        }

        let catalog = StaticCatalog::new(
            root.to_string_lossy(),
            Arc::new(MockTransport::new()),
            Duration::from_secs(60),
        );
        assert_eq!(catalog.list_collections().await.unwrap(), vec!["south"]);
        let window = catalog.get_forecast_window("south", date(11, 12)).await.unwrap();
        assert_eq!(window.days(), 2);
        let asset = catalog.resolve_asset("south", date(11, 12), 1).await.unwrap();
        assert_eq!(asset.href, "south/b.tif");
        assert!(catalog.get_band_mapping("south", date(11, 12)).await.unwrap().is_empty());
    }
}
