//! Process-wide schema constants: column list, shared field patterns and
//! per-column type casters. Initialized once, never mutated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical column order of the persisted record sheet.
pub const COLUMNS: [&str; 13] = [
    "date",
    "time",
    "vehicle",
    "plate",
    "folio",
    "variant",
    "frequency",
    "driver",
    "ab",
    "sd",
    "ci",
    "pct_ev",
    "te",
];

/// Name of the sheet holding the record collection inside the store.
pub const RECORDS_SHEET: &str = "records";

/// Columns forming the composite identity key.
pub const KEY_COLUMNS: [&str; 3] = ["folio", "date", "vehicle"];

pub static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2}-\d{2}-\d{4})\b").unwrap());

pub static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2}:\d{2}:\d{2})\b").unwrap());

/// Refined anchor: date immediately followed by a time token. The source
/// wraps the time onto the next visual line often enough that anchoring on
/// the date alone loses it.
pub static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<date>\d{2}-\d{2}-\d{4})\s+(?P<time>\d{2}:\d{2}:\d{2})\b").unwrap()
});

/// AB | SD | CI counter triplet.
pub static TRIPLE_PIPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*\|\s*(\d+)\s*\|\s*(\d+)").unwrap());

/// EV | TE pair.
pub static PAIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*\|\s*(\d+)").unwrap());

/// Percentage with comma or dot decimals.
pub static PCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:[.,]\d+)?)\s*%").unwrap());

/// Column-header fragments the source re-prints mid-page when its columns
/// wrap. Stripped before segmentation.
pub static HEADER_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:^|#)\s*Fecha\s+M[aá]qui?\s*na\s+Paten\s*te.*?AB\s*\|\s*SD.*?TE")
        .unwrap()
});

/// A digit run broken across a line boundary. The layout splits folio,
/// percentage and counter digits arbitrarily; these must be rejoined, not
/// treated as separate tokens.
pub static SPLIT_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*\n\s*(\d)").unwrap());

/// Alphabetic word runs, including the accented letters of the source
/// language. Used to recover driver-name continuations.
pub static LETTER_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-zÁÉÍÓÚÑáéíóúñ]+").unwrap());

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse interior whitespace to single spaces and trim.
pub fn normalize_space(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Index of a column in the canonical order.
pub fn column_index(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| *c == name)
}

/// Scalar cell of a persisted sheet.
///
/// Untagged so sheets serialize to plain JSON values and a store written
/// by an earlier run (or edited by hand) reads back without a schema tag.
/// Variant order matters for deserialization: integers before floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn from_opt_int(v: Option<i64>) -> Self {
        v.map(Cell::Int).unwrap_or(Cell::Empty)
    }

    pub fn from_opt_float(v: Option<f64>) -> Self {
        v.map(Cell::Float).unwrap_or(Cell::Empty)
    }

    pub fn from_opt_text(v: Option<&str>) -> Self {
        v.map(|s| Cell::Text(s.to_string())).unwrap_or(Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Normalized text form used for key comparison, so an integer-typed
    /// and a text-typed folio compare equal across a store round-trip.
    pub fn key_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => format!("{v}"),
            Cell::Text(s) => s.trim().to_string(),
        }
    }
}

/// Parse to integer, or degrade to [`Cell::Empty`] on failure.
pub fn coerce_int(cell: &Cell) -> Cell {
    match cell {
        Cell::Empty => Cell::Empty,
        Cell::Int(v) => Cell::Int(*v),
        Cell::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Cell::Int(*v as i64),
        Cell::Float(_) => Cell::Empty,
        Cell::Text(s) => s.trim().parse::<i64>().map(Cell::Int).unwrap_or(Cell::Empty),
    }
}

/// Parse to float (comma or dot decimals), or degrade to [`Cell::Empty`].
pub fn coerce_float(cell: &Cell) -> Cell {
    match cell {
        Cell::Empty => Cell::Empty,
        Cell::Int(v) => Cell::Float(*v as f64),
        Cell::Float(v) => Cell::Float(*v),
        Cell::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Cell::Float)
            .unwrap_or(Cell::Empty),
    }
}

/// Per-column type casters, re-applied uniformly after every merge.
pub const TYPE_CASTERS: [(&str, fn(&Cell) -> Cell); 8] = [
    ("vehicle", coerce_int),
    ("variant", coerce_int),
    ("frequency", coerce_int),
    ("ab", coerce_int),
    ("sd", coerce_int),
    ("ci", coerce_int),
    ("pct_ev", coerce_float),
    ("te", coerce_int),
];
