use std::path::Path;

use mupdf::{Document, TextPageFlags};

use despacho_core::{SourceError, TextLayerSource};

/// MuPDF-based implementation of [`TextLayerSource`].
///
/// This crate is the sole AGPL island — it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the parsing and merge code paths do not
/// transitively depend on it.
#[derive(Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TextLayerSource for MupdfBackend {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, SourceError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| SourceError::Open("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| SourceError::Open(e.to_string()))?;

        let mut pages_text = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| SourceError::Extraction(e.to_string()))?
        {
            let page = page_result.map_err(|e| SourceError::Extraction(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| SourceError::Extraction(e.to_string()))?;

            // Line-per-line assembly keeps the layout's line breaks, which
            // the segmenter needs: wrapped times and split digit runs are
            // recognized by where the lines fall.
            let mut page_text = String::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
            }
            pages_text.push(page_text);
        }

        Ok(pages_text)
    }
}
