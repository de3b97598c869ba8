//! Drives the three extraction strategies over one document, cheapest
//! first, and returns the first non-empty yield.
//!
//! Strategy order: native text layer → table structure → OCR. Each is a
//! value behind one common trait, iterated in order. Optional
//! collaborators (table, OCR) may be absent entirely; their strategies
//! are skipped, never errors.

use std::path::Path;

use thiserror::Error;

use despacho_core::{OcrSource, Record, SourceError, TableSource, TextLayerSource};
use despacho_parsing::{record_from_line, records_from_page};

// Re-export domain types for convenience
pub use despacho_core::ProgressEvent;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

/// Result of extracting one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// Record count per page. Only the text-layer strategy produces
    /// meaningful page attribution; the others leave this empty.
    pub per_page: Vec<usize>,
    /// `"text"`, `"table"`, `"ocr"`, or `"none"` when every attempted
    /// strategy came up empty.
    pub strategy: &'static str,
}

trait Strategy {
    fn label(&self) -> &'static str;
    fn enabled(&self) -> bool {
        true
    }
    fn attempt(
        &self,
        path: &Path,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(Vec<Record>, Vec<usize>), IngestError>;
}

struct TextStrategy<'a>(&'a dyn TextLayerSource);

impl Strategy for TextStrategy<'_> {
    fn label(&self) -> &'static str {
        "text"
    }

    // A document whose text layer cannot be opened at all is a fatal
    // error, not a fallback case.
    fn attempt(
        &self,
        path: &Path,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(Vec<Record>, Vec<usize>), IngestError> {
        let pages = self.0.page_texts(path)?;
        let mut records = Vec::new();
        let mut per_page = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            let page_records = records_from_page(page);
            progress(ProgressEvent::Page {
                page: i + 1,
                records: page_records.len(),
            });
            per_page.push(page_records.len());
            records.extend(page_records);
        }
        Ok((records, per_page))
    }
}

struct TableStrategy<'a>(&'a dyn TableSource);

impl Strategy for TableStrategy<'_> {
    fn label(&self) -> &'static str {
        "table"
    }

    fn enabled(&self) -> bool {
        self.0.available()
    }

    fn attempt(
        &self,
        path: &Path,
        _progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(Vec<Record>, Vec<usize>), IngestError> {
        // A failing table tool means "this strategy found nothing", so the
        // chain falls through instead of aborting the document.
        let lines = match self.0.row_lines(path) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "table extraction failed");
                return Ok((Vec::new(), Vec::new()));
            }
        };
        let records = lines.iter().filter_map(|l| record_from_line(l)).collect();
        Ok((records, Vec::new()))
    }
}

struct OcrStrategy<'a> {
    source: &'a dyn OcrSource,
    requested: bool,
}

impl Strategy for OcrStrategy<'_> {
    fn label(&self) -> &'static str {
        "ocr"
    }

    fn enabled(&self) -> bool {
        self.requested && self.source.available()
    }

    fn attempt(
        &self,
        path: &Path,
        _progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(Vec<Record>, Vec<usize>), IngestError> {
        // Rasterization failure is document-fatal, like an unopenable file.
        let text = self.source.document_text(path)?;
        Ok((records_from_page(&text), Vec::new()))
    }
}

/// Capability-injected extraction orchestrator.
pub struct Orchestrator {
    text: Box<dyn TextLayerSource>,
    table: Option<Box<dyn TableSource>>,
    ocr: Option<Box<dyn OcrSource>>,
}

impl Orchestrator {
    pub fn new(text: Box<dyn TextLayerSource>) -> Self {
        Self {
            text,
            table: None,
            ocr: None,
        }
    }

    pub fn with_table(mut self, table: Box<dyn TableSource>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_ocr(mut self, ocr: Box<dyn OcrSource>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Orchestrator wired to the stock backends: mupdf text layer,
    /// Poppler tables, tesseract OCR.
    #[cfg(feature = "pdf")]
    pub fn with_default_sources() -> Self {
        Self::new(Box::new(despacho_pdf_mupdf::MupdfBackend::new()))
            .with_table(Box::new(despacho_table_poppler::PopplerTableSource::new()))
            .with_ocr(Box::new(despacho_ocr_tesseract::TesseractOcrSource::new()))
    }

    /// Extract all records from one document.
    ///
    /// Strategies run in order; the first one yielding any records wins
    /// and its label is reported. `progress` is invoked synchronously
    /// after each page of the text-layer strategy.
    pub fn extract(
        &self,
        path: &Path,
        ocr_enabled: bool,
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<Extraction, IngestError> {
        let text_strategy = TextStrategy(self.text.as_ref());
        let table_strategy = self.table.as_deref().map(TableStrategy);
        let ocr_strategy = self.ocr.as_deref().map(|source| OcrStrategy {
            source,
            requested: ocr_enabled,
        });

        let mut strategies: Vec<&dyn Strategy> = vec![&text_strategy];
        if let Some(s) = &table_strategy {
            strategies.push(s);
        }
        if let Some(s) = &ocr_strategy {
            strategies.push(s);
        }

        for strategy in strategies {
            if !strategy.enabled() {
                tracing::debug!(strategy = strategy.label(), "strategy unavailable, skipped");
                continue;
            }
            let (records, per_page) = strategy.attempt(path, &mut progress)?;
            if !records.is_empty() {
                progress(ProgressEvent::StrategyChosen {
                    strategy: strategy.label(),
                    records: records.len(),
                });
                return Ok(Extraction {
                    records,
                    per_page,
                    strategy: strategy.label(),
                });
            }
            tracing::debug!(strategy = strategy.label(), "strategy yielded no records");
        }

        Ok(Extraction {
            records: Vec::new(),
            per_page: Vec::new(),
            strategy: "none",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const GOOD_PAGE: &str = "01-02-2024 08:15:00 12 WXYZ12 123456789 021 15 JUAN PEREZ 4321";
    const GOOD_ROW: &str = "02-02-2024 09:30:00 13 ABCD34 987654321 8765";

    struct PagesSource(Vec<String>);

    impl TextLayerSource for PagesSource {
        fn page_texts(&self, _path: &Path) -> Result<Vec<String>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct StubTable {
        rows: Vec<String>,
        available: bool,
    }

    impl TableSource for StubTable {
        fn available(&self) -> bool {
            self.available
        }
        fn row_lines(&self, _path: &Path) -> Result<Vec<String>, SourceError> {
            Ok(self.rows.clone())
        }
    }

    struct FailingTable;

    impl TableSource for FailingTable {
        fn available(&self) -> bool {
            true
        }
        fn row_lines(&self, _path: &Path) -> Result<Vec<String>, SourceError> {
            Err(SourceError::Extraction("broken table structure".into()))
        }
    }

    struct StubOcr {
        text: String,
        available: bool,
    }

    impl OcrSource for StubOcr {
        fn available(&self) -> bool {
            self.available
        }
        fn document_text(&self, _path: &Path) -> Result<String, SourceError> {
            Ok(self.text.clone())
        }
    }

    fn doc() -> PathBuf {
        PathBuf::from("informe.pdf")
    }

    #[test]
    fn text_layer_wins_when_it_yields() {
        let orchestrator = Orchestrator::new(Box::new(PagesSource(vec![
            GOOD_PAGE.to_string(),
            "página sin registros".to_string(),
        ])))
        .with_table(Box::new(StubTable {
            rows: vec![GOOD_ROW.to_string()],
            available: true,
        }));

        let extraction = orchestrator.extract(&doc(), false, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "text");
        assert_eq!(extraction.per_page, vec![1, 0]);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].folio, "1234567894321");
    }

    #[test]
    fn falls_back_to_table_when_text_is_empty() {
        let orchestrator =
            Orchestrator::new(Box::new(PagesSource(vec!["nada".to_string()])))
                .with_table(Box::new(StubTable {
                    rows: vec!["encabezado".to_string(), GOOD_ROW.to_string()],
                    available: true,
                }));

        let extraction = orchestrator.extract(&doc(), false, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "table");
        assert!(extraction.per_page.is_empty());
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].folio, "9876543218765");
    }

    #[test]
    fn everything_empty_reports_none() {
        let orchestrator =
            Orchestrator::new(Box::new(PagesSource(vec!["nada".to_string()])))
                .with_table(Box::new(StubTable {
                    rows: vec![],
                    available: true,
                }));

        let extraction = orchestrator.extract(&doc(), false, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "none");
        assert!(extraction.records.is_empty());
    }

    #[test]
    fn unavailable_table_is_skipped_silently() {
        let orchestrator =
            Orchestrator::new(Box::new(PagesSource(vec!["nada".to_string()])))
                .with_table(Box::new(StubTable {
                    rows: vec![GOOD_ROW.to_string()],
                    available: false,
                }))
                .with_ocr(Box::new(StubOcr {
                    text: GOOD_PAGE.to_string(),
                    available: true,
                }));

        let extraction = orchestrator.extract(&doc(), true, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "ocr");
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn table_failure_degrades_to_next_strategy() {
        let orchestrator =
            Orchestrator::new(Box::new(PagesSource(vec!["nada".to_string()])))
                .with_table(Box::new(FailingTable))
                .with_ocr(Box::new(StubOcr {
                    text: GOOD_PAGE.to_string(),
                    available: true,
                }));

        let extraction = orchestrator.extract(&doc(), true, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "ocr");
    }

    #[test]
    fn ocr_requires_the_flag_even_when_available() {
        let orchestrator =
            Orchestrator::new(Box::new(PagesSource(vec!["nada".to_string()])))
                .with_ocr(Box::new(StubOcr {
                    text: GOOD_PAGE.to_string(),
                    available: true,
                }));

        let extraction = orchestrator.extract(&doc(), false, |_| {}).unwrap();
        assert_eq!(extraction.strategy, "none");
    }

    #[test]
    fn progress_reports_each_page_then_the_winner() {
        let orchestrator = Orchestrator::new(Box::new(PagesSource(vec![
            GOOD_PAGE.to_string(),
            "nada".to_string(),
        ])));

        let mut events = Vec::new();
        orchestrator
            .extract(&doc(), false, |e| events.push(e))
            .unwrap();

        assert!(matches!(
            events[0],
            ProgressEvent::Page { page: 1, records: 1 }
        ));
        assert!(matches!(
            events[1],
            ProgressEvent::Page { page: 2, records: 0 }
        ));
        assert!(matches!(
            events[2],
            ProgressEvent::StrategyChosen {
                strategy: "text",
                records: 1
            }
        ));
    }
}
