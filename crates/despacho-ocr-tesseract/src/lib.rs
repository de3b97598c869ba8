//! OCR extraction for scanned reports: `pdftoppm` rasterizes each page at
//! 300 dpi, `tesseract` recognizes the images, and the per-page texts are
//! concatenated in page order.
//!
//! Like the table collaborator, this is optional equipment: both binaries
//! must be present for [`OcrSource::available`] to report true.

use std::path::Path;
use std::process::Command;

use despacho_core::{OcrSource, SourceError};

pub struct TesseractOcrSource {
    /// Recognition language passed to tesseract. The reports are Spanish.
    lang: String,
    dpi: u32,
}

impl Default for TesseractOcrSource {
    fn default() -> Self {
        Self {
            lang: "spa".to_string(),
            dpi: 300,
        }
    }
}

impl TesseractOcrSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            ..Self::default()
        }
    }
}

fn command_available(binary: &str) -> bool {
    Command::new(binary).arg("--version").output().is_ok()
}

impl OcrSource for TesseractOcrSource {
    fn available(&self) -> bool {
        command_available("pdftoppm") && command_available("tesseract")
    }

    fn document_text(&self, path: &Path) -> Result<String, SourceError> {
        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("page");

        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()?;
        if !output.status.success() {
            return Err(SourceError::Tool {
                tool: "pdftoppm",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // pdftoppm zero-pads page numbers, so name order is page order.
        let mut images: Vec<_> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        images.sort();

        tracing::debug!(path = %path.display(), pages = images.len(), "running OCR");

        let mut texts = Vec::with_capacity(images.len());
        for image in &images {
            let output = Command::new("tesseract")
                .arg(image)
                .arg("stdout")
                .arg("-l")
                .arg(&self.lang)
                .output()?;
            if !output.status.success() {
                return Err(SourceError::Tool {
                    tool: "tesseract",
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            texts.push(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        Ok(texts.join("\n"))
    }
}
