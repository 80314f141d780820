use clap::Parser;
use icenet_viewer::{CatalogSource, Config, ViewerServer};
use tracing_subscriber::{EnvFilter, fmt};

/// Sea-ice forecast viewer
#[derive(Parser, Debug)]
#[command(name = "icenet-viewer")]
#[command(about = "Serves a map viewer for sea-ice forecast COGs catalogued in STAC")]
struct Args {
    /// Raster tile service
    #[arg(long, env = "TITILER_URL", default_value = icenet_viewer::config::DEFAULT_TITILER_URL)]
    titiler_url: String,

    /// Base URL that relative asset hrefs are served from
    #[arg(long, env = "DATA_URL", default_value = icenet_viewer::config::DEFAULT_DATA_URL)]
    data_url: String,

    /// Static catalog.json (path or URL); defaults to {DATA_URL}/data/stac/catalog.json
    #[arg(long, env = "CATALOG_PATH")]
    catalog_path: Option<String>,

    /// STAC API root; takes precedence over the static catalog
    #[arg(long, env = "STAC_API_URL")]
    stac_api_url: Option<String>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8001)]
    port: u16,

    /// Colormap shown to new sessions
    #[arg(long, env = "DEFAULT_COLORMAP", default_value = icenet_viewer::config::DEFAULT_COLORMAP)]
    colormap: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Config {
        let catalog = match (self.stac_api_url, self.catalog_path) {
            (Some(api), _) => CatalogSource::Api(api),
            (None, Some(path)) => CatalogSource::Static(path),
            (None, None) => CatalogSource::Static(Config::default_catalog_path(&self.data_url)),
        };
        Config {
            catalog,
            titiler_url: self.titiler_url,
            data_url: self.data_url,
            port: self.port,
            default_colormap: self.colormap,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(true).init();

    let server = ViewerServer::new(args.into_config())?;
    server.start().await
}
