//! Persisted tabular store: a JSON workbook of named sheets.
//!
//! The record collection lives in the `records` sheet with a fixed column
//! order. Any other sheet found alongside it belongs to the user and is
//! rewritten untouched. The lifecycle is deliberately wholesale: read the
//! whole store, merge in memory, rewrite the whole store — nothing is
//! written before the merge has fully computed, so a failed run leaves the
//! file as it was.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use despacho_core::schema::{COLUMNS, RECORDS_SHEET};
use despacho_core::{Cell, Record, apply_column_types, merge_rows};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store: {0}")]
    Format(#[from] serde_json::Error),
}

/// One named collection of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// The whole persisted store. Sheet order is preserved across rewrites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub sheets: Vec<Sheet>,
}

impl Store {
    /// Read a store from disk. A missing file is an empty store, not an
    /// error; anything else unreadable propagates.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Store::default());
        }
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Rewrite the whole store.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Replace a sheet's contents in place, keeping its position; a new
    /// sheet goes at the end.
    pub fn replace_sheet(&mut self, name: &str, columns: Vec<String>, rows: Vec<Vec<Cell>>) {
        match self.sheets.iter_mut().find(|s| s.name == name) {
            Some(sheet) => {
                sheet.columns = columns;
                sheet.rows = rows;
            }
            None => self.sheets.push(Sheet {
                name: name.to_string(),
                columns,
                rows,
            }),
        }
    }

    /// Rows of the records sheet, conformed to canonical column order.
    ///
    /// A store written by an older build (or edited by hand) may carry the
    /// columns in a different order or miss some entirely; missing cells
    /// become empty, unknown columns are dropped.
    pub fn record_rows(&self) -> Vec<Vec<Cell>> {
        let Some(sheet) = self.sheet(RECORDS_SHEET) else {
            return Vec::new();
        };
        let indices: Vec<Option<usize>> = COLUMNS
            .iter()
            .map(|name| sheet.columns.iter().position(|c| c == name))
            .collect();
        sheet
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| {
                        idx.and_then(|i| row.get(i))
                            .cloned()
                            .unwrap_or(Cell::Empty)
                    })
                    .collect()
            })
            .collect()
    }
}

fn canonical_columns() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn record_rows(records: &[Record]) -> Vec<Vec<Cell>> {
    records.iter().map(Record::to_row).collect()
}

/// Write a fresh store holding only the given records.
///
/// If a store already exists at `out`, its unrelated sheets survive; only
/// the records sheet is replaced.
pub fn create(out: &Path, records: &[Record]) -> Result<PathBuf, StoreError> {
    let mut rows = record_rows(records);
    apply_column_types(&mut rows);

    let mut store = Store::load(out)?;
    store.replace_sheet(RECORDS_SHEET, canonical_columns(), rows);
    store.save(out)?;
    tracing::info!(path = %out.display(), "store written");
    Ok(out.to_path_buf())
}

/// Merge newly extracted records into the store at `base` and rewrite.
///
/// Existing rows win over new rows sharing their identity key. `out`
/// defaults to overwriting `base`; unrelated sheets of the base store are
/// carried over unchanged either way.
pub fn append(base: &Path, records: &[Record], out: Option<&Path>) -> Result<PathBuf, StoreError> {
    let out = out.unwrap_or(base);

    let mut store = Store::load(base)?;
    let merged = merge_rows(store.record_rows(), record_rows(records));
    let kept = merged.len();
    store.replace_sheet(RECORDS_SHEET, canonical_columns(), merged);
    store.save(out)?;
    tracing::info!(path = %out.display(), rows = kept, "store merged and rewritten");
    Ok(out.to_path_buf())
}
