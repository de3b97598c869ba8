//! Table-structure extraction backed by Poppler's `pdftotext`.
//!
//! An optional collaborator: deployments without Poppler simply lose the
//! table strategy. Availability is probed by spawning the binary, never by
//! failing at extraction time.

use std::path::Path;
use std::process::Command;

use despacho_core::{SourceError, TableSource};

/// [`TableSource`] implementation shelling out to `pdftotext`.
///
/// Grid-preserving `-layout` mode is tried first; when it detects nothing,
/// reading-order `-raw` mode is the fallback. Each non-empty output line
/// stands in for one flattened table row.
pub struct PopplerTableSource {
    binary: String,
}

impl Default for PopplerTableSource {
    fn default() -> Self {
        Self {
            binary: "pdftotext".to_string(),
        }
    }
}

impl PopplerTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the binary name/path (e.g. a bundled Poppler build).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, path: &Path, mode: &str) -> Result<Vec<String>, SourceError> {
        let output = Command::new(&self.binary)
            .arg(mode)
            .arg(path)
            .arg("-")
            .output()?;

        if !output.status.success() {
            return Err(SourceError::Tool {
                tool: "pdftotext",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl TableSource for PopplerTableSource {
    fn available(&self) -> bool {
        Command::new(&self.binary).arg("-v").output().is_ok()
    }

    fn row_lines(&self, path: &Path) -> Result<Vec<String>, SourceError> {
        let rows = self.run(path, "-layout")?;
        if !rows.is_empty() {
            return Ok(rows);
        }
        tracing::debug!(path = %path.display(), "layout mode found no rows, retrying in raw mode");
        self.run(path, "-raw")
    }
}
