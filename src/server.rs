use crate::catalog::CatalogReader;
use crate::catalog::api::ApiCatalog;
use crate::catalog::static_file::StaticCatalog;
use crate::config::{CatalogSource, Config};
use crate::routes::{
    create_session, get_colormap, get_session, index_handler, invalidate_catalog,
    list_collections, list_colormaps, post_event,
};
use crate::session::{Engine, Session};
use crate::tiler::TilerClient;
use crate::transport::{HttpTransport, Transport};
use crate::utils::status::print_catalog_summary;
use axum::{
    Router,
    routing::{get, post},
};
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub type SessionStore = Cache<Uuid, Arc<Mutex<Session>>>;

pub struct AppState {
    pub config: Config,
    pub engine: Engine,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, engine: Engine) -> Self {
        let sessions = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(config.session_idle)
            .build();
        Self {
            config,
            engine,
            sessions,
        }
    }
}

pub struct ViewerServer {
    state: Arc<AppState>,
}

impl ViewerServer {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.request_timeout)?);

        let catalog: Arc<dyn CatalogReader> = match &config.catalog {
            CatalogSource::Static(location) => Arc::new(StaticCatalog::new(
                location.clone(),
                transport.clone(),
                config.catalog_ttl,
            )),
            CatalogSource::Api(base) => Arc::new(ApiCatalog::new(
                base.clone(),
                transport.clone(),
                config.retry.clone(),
            )),
        };
        let tiler = TilerClient::new(config.titiler_url.clone(), transport);
        let engine = Engine::new(
            catalog,
            tiler,
            config.data_url.clone(),
            config.default_range,
        );

        Ok(Self {
            state: Arc::new(AppState::new(config, engine)),
        })
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let config = &self.state.config;
        info!(
            catalog = ?config.catalog,
            titiler_url = %config.titiler_url,
            data_url = %config.data_url,
            "Resolved configuration"
        );

        match self.state.engine.tiler().colormap_names().await {
            Ok(names) if !names.contains(&config.default_colormap) => {
                anyhow::bail!(
                    "Unknown colormap '{}', the raster service offers {}",
                    config.default_colormap,
                    names.join(", ")
                );
            }
            Ok(names) => info!(colormaps = names.len(), "Raster service reachable"),
            Err(e) => warn!(error = %e, "Raster service unreachable, default colormap not checked"),
        }

        print_catalog_summary(self.state.engine.catalog().as_ref(), &config.default_colormap)
            .await;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        println!(
            r#"
    🚀 Forecast viewer serving on {}

    🌍 Browse forecasts on the map
       → http://{}/map

    📚 Collections in the catalog (JSON)
       → http://{}/collections
            "#,
            addr, addr, addr
        );

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/map", get(index_handler))
        .route("/collections", get(list_collections))
        .route("/catalog/invalidate", post(invalidate_catalog))
        .route("/colormaps", get(list_colormaps))
        .route("/colormaps/{name}", get(get_colormap))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/events", post(post_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
