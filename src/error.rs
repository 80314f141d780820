use crate::transport::TransportError;
use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    // Catalog resolution
    #[error("Catalog unavailable at '{location}': {message}")]
    CatalogUnavailable {
        location: String,
        message: String,
        transient: bool,
    },

    #[error("Collection not found: '{0}'")]
    CollectionNotFound(String),

    #[error("No forecast window starting {init_date} in collection '{collection}'")]
    ForecastWindowNotFound {
        collection: String,
        init_date: NaiveDate,
    },

    #[error(
        "{count} candidates match {what} in collection '{collection}' (init {init_date}, leadtime {leadtime:?})"
    )]
    AmbiguousMatch {
        collection: String,
        init_date: NaiveDate,
        leadtime: Option<u32>,
        what: &'static str,
        count: usize,
    },

    #[error("No {what} in collection '{collection}' for init {init_date}, leadtime {leadtime:?}")]
    NotFound {
        collection: String,
        init_date: NaiveDate,
        leadtime: Option<u32>,
        what: &'static str,
    },

    // Raster service
    #[error("Statistics unavailable for '{href}' band {band_index}: {message}")]
    StatisticsUnavailable {
        href: String,
        band_index: u32,
        message: String,
    },

    #[error("Unknown colormap: '{0}'")]
    UnknownColormap(String),

    #[error("Raster service unavailable at '{url}': {message}")]
    RasterServiceUnavailable {
        url: String,
        message: String,
        transient: bool,
    },

    // Inputs
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl ViewerError {
    pub fn catalog_unavailable(location: impl Into<String>, err: &TransportError) -> Self {
        ViewerError::CatalogUnavailable {
            location: location.into(),
            message: err.to_string(),
            transient: err.is_transient(),
        }
    }

    pub fn raster_service_unavailable(url: impl Into<String>, err: &TransportError) -> Self {
        ViewerError::RasterServiceUnavailable {
            url: url.into(),
            message: err.to_string(),
            transient: err.is_transient(),
        }
    }

    /// Failures caused by the network or an upstream outage rather than by the
    /// catalog content. Layers already on the map survive these.
    pub fn is_transient(&self) -> bool {
        match self {
            ViewerError::CatalogUnavailable { transient, .. }
            | ViewerError::RasterServiceUnavailable { transient, .. } => *transient,
            ViewerError::StatisticsUnavailable { .. } => true,
            _ => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            ViewerError::UnknownColormap(_)
            | ViewerError::InvalidUrl { .. }
            | ViewerError::InvalidEvent(_) => 400,

            ViewerError::CollectionNotFound(_)
            | ViewerError::ForecastWindowNotFound { .. }
            | ViewerError::NotFound { .. }
            | ViewerError::SessionNotFound(_) => 404,

            ViewerError::AmbiguousMatch { .. } => 409,

            ViewerError::CatalogUnavailable { .. }
            | ViewerError::StatisticsUnavailable { .. }
            | ViewerError::RasterServiceUnavailable { .. } => 503,
        }
    }
}
