pub mod fields;
pub mod segment;

pub use fields::parse_block;
pub use segment::{Block, segment, strip_header_noise};

use despacho_core::Record;
use despacho_core::schema::{DATE_RE, DATE_TIME_RE};

/// Extract every record from one page of raw text.
///
/// Pipeline: strip header noise → segment into anchored blocks → recover
/// fields per block. Blocks without a date or folio are silently dropped.
pub fn records_from_page(raw: &str) -> Vec<Record> {
    let text = strip_header_noise(raw);
    segment(&text)
        .iter()
        .filter_map(|b| parse_block(b.tail, b.date, b.time))
        .collect()
}

/// Parse one flattened table row.
///
/// Table extraction yields whole rows rather than pages, so the anchor is
/// located inside the line and the remainder goes through the same field
/// recovery as a segmented block.
pub fn record_from_line(line: &str) -> Option<Record> {
    if let Some(c) = DATE_TIME_RE.captures(line) {
        let whole = c.get(0).unwrap();
        return parse_block(
            &line[whole.end()..],
            c.name("date").unwrap().as_str(),
            Some(c.name("time").unwrap().as_str()),
        );
    }
    // Rows from older report formats carry no time column.
    let m = DATE_RE.find(line)?;
    parse_block(&line[m.end()..], m.as_str(), None)
}
