use crate::catalog::CatalogReader;
use crate::tiler::colormap::ansi_colourbar;
use chrono::NaiveDate;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use indicatif::{ProgressBar, ProgressStyle};

/// One row of the startup summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub collection: String,
    pub dates: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    /// Window length of the latest forecast
    pub days: Option<u32>,
    pub bands: Vec<String>,
    pub error: Option<String>,
}

pub async fn summarise_collection(catalog: &dyn CatalogReader, collection: &str) -> CollectionSummary {
    let mut summary = CollectionSummary {
        collection: collection.to_string(),
        dates: 0,
        first: None,
        last: None,
        days: None,
        bands: Vec::new(),
        error: None,
    };

    let dates = match catalog.list_initialization_dates(collection).await {
        Ok(dates) => dates,
        Err(e) => {
            summary.error = Some(e.to_string());
            return summary;
        }
    };
    summary.dates = dates.len();
    summary.first = dates.first().copied();
    summary.last = dates.last().copied();

    if let Some(last) = summary.last {
        match catalog.get_forecast_window(collection, last).await {
            Ok(window) => summary.days = Some(window.days()),
            Err(e) => summary.error = Some(e.to_string()),
        }
        if let Ok(bands) = catalog.get_band_mapping(collection, last).await {
            summary.bands = bands.iter().map(|b| b.name.clone()).collect();
        }
    }
    summary
}

pub async fn print_catalog_summary(catalog: &dyn CatalogReader, colormap: &str) {
    let collections = match catalog.list_collections().await {
        Ok(collections) => collections,
        Err(e) => {
            println!("\n⚠️ Catalog unavailable: {}\n", e);
            return;
        }
    };

    let pb = ProgressBar::new(collections.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} {percent}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    pb.set_message("Scanning forecast collections...");

    let mut summaries = Vec::with_capacity(collections.len());
    for collection in &collections {
        summaries.push(summarise_collection(catalog, collection).await);
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("\nCatalog summary:\n{}", summary_table(&summaries));
    if let Some(bar) = ansi_colourbar(colormap, 20) {
        println!("Default colormap {}: {}", colormap, bar);
    }

    let warnings: Vec<String> = summaries
        .iter()
        .filter_map(|s| s.error.as_ref().map(|e| format!("  ⚠️{}: {}", s.collection, e)))
        .collect();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("{}", warning);
        }
    }
    println!();
}

pub fn summary_table(summaries: &[CollectionSummary]) -> Table {
    let header = |name: &str| {
        Cell::new(name)
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center)
    };
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());

    let mut table = Table::new();
    table
        .set_header(vec![
            header(""),
            header("Collection"),
            header("Forecasts"),
            header("First"),
            header("Latest"),
            header("Days"),
            header("Variables"),
        ])
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);

    for s in summaries {
        let status = if s.error.is_some() { "⚠️" } else { "✅" };
        table.add_row(vec![
            Cell::new(status).set_alignment(CellAlignment::Center),
            Cell::new(&s.collection),
            Cell::new(s.dates).set_alignment(CellAlignment::Center),
            Cell::new(date(s.first)).set_alignment(CellAlignment::Center),
            Cell::new(date(s.last)).set_alignment(CellAlignment::Center),
            Cell::new(s.days.map(|d| d.to_string()).unwrap_or_else(|| "-".into()))
                .set_alignment(CellAlignment::Center),
            Cell::new(s.bands.join(", ")),
        ]);
    }
    table
}
