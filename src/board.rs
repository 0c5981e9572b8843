use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::cell::{DisplayValue, render_cell};
use crate::dataset::{self, Column, Dataset, Record, ViewOptions};
use crate::source::{self, Source};

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Loaded {
    pub dataset: Dataset,
    pub columns: Vec<Column>,
    /// Set when the fetch failed and the board degraded to no data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

/// Owns the page state: empty until the single load completes, read-only afterwards.
pub struct Board {
    options: ViewOptions,
    source: Source,
    state: OnceLock<Loaded>,
}

impl Board {
    pub fn new(source: Source, options: ViewOptions) -> Self {
        Self { options, source, state: OnceLock::new() }
    }

    pub fn options(&self) -> &ViewOptions { &self.options }

    pub fn source(&self) -> &Source { &self.source }

    /// Fetches and normalizes the source. A second call returns the first result.
    pub fn load(&self) -> &Loaded {
        if let Some(l) = self.state.get() { return l; }
        match source::fetch_csv(&self.source) {
            Ok(text) => self.load_text(&text, Utc::now()),
            Err(e) => {
                log::warn!("Could not fetch {}: {:#}", self.source, e);
                self.state.get_or_init(|| Loaded { fetch_error: Some(format!("{:#}", e)), ..Default::default() })
            }
        }
    }

    /// Loads from CSV text already in hand.
    pub fn load_text(&self, text: &str, now: DateTime<Utc>) -> &Loaded {
        self.state.get_or_init(|| self.assemble(text, now))
    }

    fn assemble(&self, text: &str, now: DateTime<Utc>) -> Loaded {
        let (dataset, columns) = dataset::build(text, &self.options, now);
        log::info!("Loaded {} rows across {} columns from {}", dataset.len(), columns.len(), self.source);
        Loaded { dataset, columns, fetch_error: None }
    }

    /// Empty until `load` has run.
    pub fn loaded(&self) -> Option<&Loaded> { self.state.get() }

    pub fn render(&self, column: &Column, record: &Record) -> DisplayValue {
        render_cell(&column.name, record.get(&column.name).unwrap_or(""), self.options.sanitize_cells)
    }
}
