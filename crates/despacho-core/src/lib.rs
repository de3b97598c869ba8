use std::path::Path;

use thiserror::Error;

pub mod merge;
pub mod schema;

// Re-export for convenience
pub use merge::{apply_column_types, dedup_rows, merge_rows, row_key};
pub use schema::{Cell, COLUMNS, KEY_COLUMNS, RECORDS_SHEET, normalize_space};

/// One dispatch event recovered from a depot report.
///
/// `date` and `folio` are mandatory: a block missing either is dropped
/// during extraction and a `Record` for it is never materialized, so both
/// are plain fields rather than options.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Literal `dd-mm-yyyy` token from the report.
    pub date: String,
    /// Literal `hh:mm:ss` token; the source sometimes wraps it onto the
    /// next visual line, and some older report formats omit it entirely.
    pub time: Option<String>,
    pub vehicle: Option<i64>,
    /// Exactly 4 letters + 2 digits when present.
    pub plate: Option<String>,
    /// Composite identifier: 7–10 digit prefix ++ 4 digit suffix.
    pub folio: String,
    pub variant: Option<i64>,
    pub frequency: Option<i64>,
    pub driver: Option<String>,
    pub ab: Option<i64>,
    pub sd: Option<i64>,
    pub ci: Option<i64>,
    pub pct_ev: Option<f64>,
    pub te: Option<i64>,
}

/// Composite identity key. Two records with equal keys are the same
/// logical dispatch event regardless of any other field differences.
pub type RecordKey = (String, String, Option<i64>);

impl Record {
    pub fn key(&self) -> RecordKey {
        (self.folio.clone(), self.date.clone(), self.vehicle)
    }

    /// Cells in canonical [`COLUMNS`] order, for the persisted store.
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.date.clone()),
            Cell::from_opt_text(self.time.as_deref()),
            Cell::from_opt_int(self.vehicle),
            Cell::from_opt_text(self.plate.as_deref()),
            Cell::Text(self.folio.clone()),
            Cell::from_opt_int(self.variant),
            Cell::from_opt_int(self.frequency),
            Cell::from_opt_text(self.driver.as_deref()),
            Cell::from_opt_int(self.ab),
            Cell::from_opt_int(self.sd),
            Cell::from_opt_int(self.ci),
            Cell::from_opt_float(self.pct_ev),
            Cell::from_opt_int(self.te),
        ]
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open document: {0}")]
    Open(String),
    #[error("failed to extract text: {0}")]
    Extraction(String),
    #[error("external tool `{tool}` failed: {message}")]
    Tool { tool: &'static str, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for native text-layer extraction backends.
///
/// Implementors provide the low-level per-page text; segmentation and
/// field recovery live in `despacho-parsing`.
pub trait TextLayerSource: Send + Sync {
    /// Extract the text layer of every page, in page order.
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, SourceError>;
}

/// Optional table-structure extraction capability.
///
/// May be entirely unavailable in a deployment; the orchestrator consults
/// [`TableSource::available`] and skips the strategy when it returns false.
pub trait TableSource: Send + Sync {
    fn available(&self) -> bool;
    /// Detected table rows, flattened to one line of space-joined cell
    /// values per row, whole document.
    fn row_lines(&self, path: &Path) -> Result<Vec<String>, SourceError>;
}

/// Optional OCR capability for scanned reports.
pub trait OcrSource: Send + Sync {
    fn available(&self) -> bool;
    /// Recognized text of the whole document, pages concatenated in order.
    fn document_text(&self, path: &Path) -> Result<String, SourceError>;
}

/// Progress events emitted while a document is processed.
///
/// The pipeline itself is synchronous; an interactive front end may run it
/// on a worker and forward these to its event loop.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A page finished the text-layer strategy (1-based page number).
    Page { page: usize, records: usize },
    /// A strategy produced the final record set for the document.
    StrategyChosen {
        strategy: &'static str,
        records: usize,
    },
}
