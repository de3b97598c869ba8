//! Incremental merge: concatenate, deduplicate by identity key, re-coerce
//! column types. Operates on persisted-store rows so records coming back
//! from an old store (where types may have degraded to text) and freshly
//! extracted ones go through the same path.

use std::collections::HashSet;

use crate::schema::{Cell, KEY_COLUMNS, TYPE_CASTERS, column_index};

/// Normalized identity key of a row: `(folio, date, vehicle)` in text form.
pub fn row_key(row: &[Cell]) -> (String, String, String) {
    let cell = |name: &str| {
        column_index(name)
            .and_then(|i| row.get(i))
            .map(Cell::key_text)
            .unwrap_or_default()
    };
    (cell(KEY_COLUMNS[0]), cell(KEY_COLUMNS[1]), cell(KEY_COLUMNS[2]))
}

/// Drop later rows whose key repeats, keeping the first occurrence.
pub fn dedup_rows(rows: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row_key(row)))
        .collect()
}

/// Re-apply every column-level type caster to every row.
///
/// Applied after each merge regardless of how individual rows were
/// produced; idempotent.
pub fn apply_column_types(rows: &mut [Vec<Cell>]) {
    for (name, caster) in TYPE_CASTERS {
        let Some(idx) = column_index(name) else { continue };
        for row in rows.iter_mut() {
            if let Some(cell) = row.get_mut(idx) {
                *cell = caster(cell);
            }
        }
    }
}

/// Merge an existing record set with newly extracted rows.
///
/// Existing rows come first, so an incumbent always wins over a new row
/// sharing its key, even when the new extraction has richer fields.
pub fn merge_rows(existing: Vec<Vec<Cell>>, new: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    let mut all = existing;
    all.extend(new);
    let mut merged = dedup_rows(all);
    apply_column_types(&mut merged);
    merged
}
