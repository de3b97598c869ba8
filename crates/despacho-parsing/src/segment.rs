//! Anchor-based block segmentation of page text.
//!
//! Segmentation runs on text that still has its line structure: the
//! date+time anchor must tolerate the time wrapping onto the next line,
//! and digit runs split across lines are rejoined later, per block —
//! doing it page-wide would glue a date's last digits to a wrapped time.

use despacho_core::schema::{DATE_RE, DATE_TIME_RE, HEADER_NOISE_RE, TIME_RE};

/// One candidate record block, anchored on a date (or date+time) token.
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    pub date: &'a str,
    pub time: Option<&'a str>,
    /// Full block text, anchor included.
    pub text: &'a str,
    /// Text after the anchor match.
    pub tail: &'a str,
}

/// Remove the column-header fragments the source re-prints mid-page.
/// Applied to the whole page before segmentation.
pub fn strip_header_noise(raw: &str) -> String {
    HEADER_NOISE_RE.replace_all(raw, " ").into_owned()
}

struct Anchor {
    start: usize,
    end: usize,
    date: std::ops::Range<usize>,
    time: Option<std::ops::Range<usize>>,
}

/// Anchor occurrences, refined pattern first.
///
/// Date+time is the primary anchor. Pages from older report formats carry
/// no time column at all; for those, fall back to date-only anchors and
/// pick the time (if any) out of each block afterwards.
fn anchors(text: &str) -> Vec<Anchor> {
    let refined: Vec<Anchor> = DATE_TIME_RE
        .captures_iter(text)
        .map(|c| {
            let m = c.get(0).unwrap();
            Anchor {
                start: m.start(),
                end: m.end(),
                date: c.name("date").unwrap().range(),
                time: Some(c.name("time").unwrap().range()),
            }
        })
        .collect();
    if !refined.is_empty() {
        return refined;
    }

    DATE_RE
        .find_iter(text)
        .map(|m| Anchor {
            start: m.start(),
            end: m.end(),
            date: m.range(),
            time: None,
        })
        .collect()
}

/// Split page text into blocks, one per anchor occurrence.
///
/// Each block spans from its anchor's start to the next anchor's start (or
/// end of text): the text from the first anchor on is partitioned exactly,
/// no gaps, no overlap. Zero anchors yield zero blocks.
pub fn segment(text: &str) -> Vec<Block<'_>> {
    let anchors = anchors(text);
    let mut blocks = Vec::with_capacity(anchors.len());
    for (i, anchor) in anchors.iter().enumerate() {
        let block_end = anchors
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(text.len());
        let block_text = &text[anchor.start..block_end];
        let time = match &anchor.time {
            Some(range) => Some(&text[range.clone()]),
            // Date-only anchor: the time, when present, sits somewhere
            // inside the block rather than glued to the date.
            None => TIME_RE.find(block_text).map(|m| m.as_str()),
        };
        blocks.push(Block {
            date: &text[anchor.date.clone()],
            time,
            text: block_text,
            tail: &text[anchor.end..block_end],
        });
    }
    blocks
}
