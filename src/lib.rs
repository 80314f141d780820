pub mod catalog;
pub mod config;
pub mod error;
mod map;
pub mod routes;
pub mod server;
pub mod session;
pub mod tiler;
pub mod transport;
pub mod utils;

pub use config::{CatalogSource, Config};
pub use error::{Result, ViewerError};
pub use server::ViewerServer;
