//! Catalog backend for a live STAC API.
//!
//! Initialization dates come from paging through `/collections/{id}/items`;
//! everything scoped to one date goes through `/search` with an exact-match
//! `forecast:reference_time` query. Requests are retried on 5xx by the
//! [`RetryingTransport`] the backend is built with.

use super::forecast::ForecastGroup;
use super::stac::{CollectionList, Item, ItemCollection, Link, reference_timestamp};
use super::{AssetRef, BandMapping, CatalogReader, ForecastWindow};
use crate::error::{Result, ViewerError};
use crate::transport::{RetryPolicy, RetryingTransport, Transport, TransportError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

const PAGE_LIMIT: u32 = 100;
const MAX_PAGES: usize = 500;

pub struct ApiCatalog {
    base: String,
    transport: Arc<dyn Transport>,
}

impl ApiCatalog {
    pub fn new(base: impl Into<String>, transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            transport: Arc::new(RetryingTransport::new(transport, retry)),
        }
    }

    fn decode<T: DeserializeOwned>(url: &str, body: Value) -> Result<T> {
        serde_json::from_value(body).map_err(|e| ViewerError::CatalogUnavailable {
            location: url.to_string(),
            message: e.to_string(),
            transient: false,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self
            .transport
            .get_json(url)
            .await
            .map_err(|e| ViewerError::catalog_unavailable(url, &e))?;
        Self::decode(url, body)
    }

    async fn ensure_collection(&self, collection_id: &str) -> Result<()> {
        let url = format!("{}/collections/{}", self.base, collection_id);
        match self.transport.get_json(&url).await {
            Ok(_) => Ok(()),
            Err(TransportError::Status { status: 404, .. }) => {
                Err(ViewerError::CollectionNotFound(collection_id.to_string()))
            }
            Err(e) => Err(ViewerError::catalog_unavailable(url, &e)),
        }
    }

    /// Follow `next` links until the result set is exhausted.
    async fn paginate(&self, first_url: &str, first_body: Option<Value>) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut request = Some((first_url.to_string(), first_body));

        for _ in 0..MAX_PAGES {
            let Some((url, body)) = request.take() else {
                return Ok(items);
            };
            let page = match &body {
                Some(body) => self.transport.post_json(&url, body).await,
                None => self.transport.get_json(&url).await,
            }
            .map_err(|e| ViewerError::catalog_unavailable(&url, &e))?;
            let page: ItemCollection = Self::decode(&url, page)?;

            debug!(url = %url, count = page.features.len(), "Fetched item page");
            request = page.next_link().map(|link| next_request(link, body.as_ref()));
            items.extend(page.features);
        }

        warn!(url = %first_url, pages = MAX_PAGES, "Stopped paging, result set truncated");
        Ok(items)
    }

    /// Items whose `forecast:reference_time` equals `init_date`, as one group.
    async fn group(&self, collection_id: &str, init_date: NaiveDate) -> Result<ForecastGroup> {
        let url = format!("{}/search", self.base);
        let body = json!({
            "collections": [collection_id],
            "query": {"forecast:reference_time": {"eq": reference_timestamp(init_date)}},
            "limit": PAGE_LIMIT
        });

        let items: Vec<Item> = self
            .paginate(&url, Some(body))
            .await?
            .into_iter()
            .filter(|item| item.reference_date() == Some(init_date))
            .collect();

        if items.is_empty() {
            self.ensure_collection(collection_id).await?;
            return Err(ViewerError::ForecastWindowNotFound {
                collection: collection_id.to_string(),
                init_date,
            });
        }

        Ok(ForecastGroup {
            collection: collection_id.to_string(),
            start: init_date,
            end: None,
            items,
        })
    }
}

fn next_request(link: &Link, previous_body: Option<&Value>) -> (String, Option<Value>) {
    let is_post = link
        .method
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(false);
    if !is_post {
        return (link.href.clone(), None);
    }
    // Servers may send only the changed fields (e.g. a token) for merging
    let body = match (previous_body, &link.body) {
        (Some(Value::Object(previous)), Some(Value::Object(next))) => {
            let mut merged = previous.clone();
            merged.extend(next.clone());
            Value::Object(merged)
        }
        (_, Some(next)) => next.clone(),
        (Some(previous), None) => previous.clone(),
        (None, None) => Value::Object(Default::default()),
    };
    (link.href.clone(), Some(body))
}

#[async_trait]
impl CatalogReader for ApiCatalog {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base);
        let list: CollectionList = self.get(&url).await?;
        Ok(list.collections.into_iter().map(|c| c.id).collect())
    }

    async fn list_initialization_dates(&self, collection_id: &str) -> Result<BTreeSet<NaiveDate>> {
        self.ensure_collection(collection_id).await?;
        let url = format!(
            "{}/collections/{}/items?limit={}",
            self.base, collection_id, PAGE_LIMIT
        );
        Ok(self
            .paginate(&url, None)
            .await?
            .iter()
            .filter_map(Item::reference_date)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    const API: &str = "http://stac/api";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn series_item(id: &str, reference: &str) -> Value {
        json!({
            "id": id,
            "type": "Feature",
            "properties": {
                "forecast:reference_time": reference,
                "forecast:leadtime_length": 3,
                "start_datetime": reference
            },
            "assets": {
                "data": {
                    "href": format!("https://data/{id}.tif"),
                    "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                    "roles": ["data"],
                    "forecast:bands": [{"name": "SIC Mean", "index": 0}]
                }
            }
        })
    }

    fn api(mock: Arc<MockTransport>) -> ApiCatalog {
        ApiCatalog::new(format!("{API}/"), mock, no_wait())
    }

    #[tokio::test]
    async fn test_list_collections() {
        let mock = MockTransport::new().with_json(
            "http://stac/api/collections",
            json!({"collections": [{"id": "north"}, {"id": "south"}]}),
        );
        let catalog = api(Arc::new(mock));
        assert_eq!(catalog.list_collections().await.unwrap(), vec!["north", "south"]);
    }

    #[tokio::test]
    async fn test_initialization_dates_follow_next_links() {
        let mock = MockTransport::new()
            .with_json("http://stac/api/collections/north", json!({"id": "north"}))
            .with_json(
                "http://stac/api/collections/north/items?limit=100",
                json!({
                    "features": [series_item("a", "2024-11-12T00:00:00Z")],
                    "links": [{"rel": "next", "href": "http://stac/api/collections/north/items?token=2"}]
                }),
            )
            .with_json(
                "http://stac/api/collections/north/items?token=2",
                json!({"features": [series_item("b", "2024-11-14T00:00:00Z")], "links": []}),
            );
        let catalog = api(Arc::new(mock));
        let dates = catalog.list_initialization_dates("north").await.unwrap();
        assert_eq!(dates.into_iter().collect::<Vec<_>>(), vec![date(12), date(14)]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let mock = MockTransport::new().with_status("http://stac/api/collections/east", 404);
        let catalog = api(Arc::new(mock));
        let err = catalog.list_initialization_dates("east").await.unwrap_err();
        assert!(matches!(err, ViewerError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_uses_exact_reference_time_predicate() {
        let mock = Arc::new(MockTransport::new().with_json(
            "http://stac/api/search",
            json!({"features": [series_item("north-2024-11-12", "2024-11-12T00:00:00Z")]}),
        ));
        let catalog = api(mock.clone());

        let asset = catalog.resolve_asset("north", date(12), 2).await.unwrap();
        assert_eq!(asset.href, "https://data/north-2024-11-12.tif");

        let (url, body) = mock.requests().pop().unwrap();
        assert_eq!(url, "http://stac/api/search");
        let body = body.unwrap();
        assert_eq!(body["collections"], json!(["north"]));
        assert_eq!(
            body["query"]["forecast:reference_time"]["eq"],
            json!("2024-11-12T00:00:00Z")
        );

        let window = catalog.get_forecast_window("north", date(12)).await.unwrap();
        assert_eq!(window.days(), 3);
        let bands = catalog.get_band_mapping("north", date(12)).await.unwrap();
        assert_eq!(bands.index_of("SIC Mean"), Some(0));
    }

    #[tokio::test]
    async fn test_two_items_for_one_reference_time_are_ambiguous() {
        let mock = MockTransport::new().with_json(
            "http://stac/api/search",
            json!({"features": [
                series_item("a", "2024-11-12T00:00:00Z"),
                series_item("b", "2024-11-12T00:00:00Z")
            ]}),
        );
        let catalog = api(Arc::new(mock));
        let err = catalog.resolve_asset("north", date(12), 0).await.unwrap_err();
        assert!(matches!(err, ViewerError::AmbiguousMatch { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_search_is_window_not_found() {
        let mock = MockTransport::new()
            .with_json("http://stac/api/search", json!({"features": []}))
            .with_json("http://stac/api/collections/north", json!({"id": "north"}));
        let catalog = api(Arc::new(mock));
        let err = catalog.get_forecast_window("north", date(20)).await.unwrap_err();
        assert!(matches!(err, ViewerError::ForecastWindowNotFound { .. }));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_surface_as_unavailable() {
        let mock = Arc::new(MockTransport::new().with_script(
            "http://stac/api/collections",
            vec![Err(502), Ok(json!({"collections": [{"id": "north"}]}))],
        ));
        let catalog = api(mock.clone());
        assert_eq!(catalog.list_collections().await.unwrap(), vec!["north"]);
        assert_eq!(mock.calls(), 2);

        let down = Arc::new(MockTransport::new().with_status("http://stac/api", 500));
        let catalog = api(down.clone());
        let err = catalog.list_collections().await.unwrap_err();
        assert!(matches!(err, ViewerError::CatalogUnavailable { transient: true, .. }));
        assert_eq!(down.calls(), 5);
    }

    #[test]
    fn test_post_next_link_merges_body() {
        let link: Link = serde_json::from_value(json!({
            "rel": "next",
            "href": "http://stac/api/search",
            "method": "POST",
            "body": {"token": "abc"}
        }))
        .unwrap();
        let (url, body) = next_request(&link, Some(&json!({"collections": ["north"], "limit": 100})));
        assert_eq!(url, "http://stac/api/search");
        assert_eq!(
            body.unwrap(),
            json!({"collections": ["north"], "limit": 100, "token": "abc"})
        );
    }
}
