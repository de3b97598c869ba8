//! Field recovery from a single block.
//!
//! The block tail is cleaned (split digit runs rejoined, whitespace
//! collapsed) and tokenized once, with byte offsets. Each field is looked
//! up in a window that starts after the position consumed by the previous
//! lookup; later fields are never searched before earlier ones, since
//! stray digits belonging to an earlier field would otherwise produce
//! false positives.

use once_cell::sync::Lazy;
use regex::Regex;

use despacho_core::Record;
use despacho_core::schema::{
    LETTER_RUN_RE, PAIR_RE, PCT_RE, SPLIT_DIGITS_RE, TRIPLE_PIPE_RE, normalize_space,
};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

/// Full plate: exactly 4 letters + 2 digits.
static PLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{4}\d{2}\b").unwrap());

/// Truncated plate: 4 letters + 1 digit at the end of a fragment run, the
/// final digit having wrapped onto the next line.
static PLATE_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]{4}\d)$").unwrap());

/// Rejoin digit runs the layout broke across a line boundary, then
/// collapse whitespace. The folio, percentage and counter fields are all
/// vulnerable to arbitrary splits.
fn clean_block_text(tail: &str) -> String {
    let rejoined = SPLIT_DIGITS_RE.replace_all(tail, "$1$2");
    normalize_space(&rejoined)
}

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    end: usize,
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .find_iter(s)
        .map(|m| Token {
            text: m.as_str(),
            end: m.end(),
        })
        .collect()
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Vehicle id: first pure-digit token of 1–3 digits within the first 5
/// tokens. Returns the value and the next search position.
fn take_vehicle(tokens: &[Token]) -> (Option<i64>, usize) {
    for (i, t) in tokens.iter().take(5).enumerate() {
        if all_digits(t.text) && t.text.len() <= 3 {
            return (t.text.parse().ok(), i + 1);
        }
    }
    (None, 0)
}

/// Plate: searched in a window of up to 12 tokens, truncated early at any
/// 10+-digit token — the plate never follows the folio in source order.
///
/// Two passes: a direct 4L+2D match over concatenated token fragments,
/// then recovery of a plate split across a line break (4L+1D followed by a
/// lone single-digit token). The direct pass runs to completion first.
fn take_plate(tokens: &[Token], start: usize) -> (Option<String>, usize) {
    let mut limit = tokens.len().min(start + 12);
    for (k, t) in tokens.iter().enumerate().skip(start) {
        if all_digits(t.text) && t.text.len() >= 10 {
            limit = limit.min(k);
            break;
        }
    }

    let clean_join = |i: usize, j: usize| -> String {
        tokens[i..=j]
            .iter()
            .flat_map(|t| t.text.chars())
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_uppercase()
    };

    for i in start..limit {
        for j in i..(i + 6).min(limit) {
            let cand = clean_join(i, j);
            if let Some(m) = PLATE_RE.find(&cand) {
                return (Some(m.as_str().to_string()), j + 1);
            }
        }
    }

    for i in start..limit {
        for j in i..(i + 6).min(limit) {
            let cand = clean_join(i, j);
            if let Some(c) = PLATE_SPLIT_RE.captures(&cand)
                && j + 1 < limit
                && tokens[j + 1].text.len() == 1
                && all_digits(tokens[j + 1].text)
            {
                return (Some(format!("{}{}", &c[1], tokens[j + 1].text)), j + 2);
            }
        }
    }

    (None, start)
}

/// Folio prefix: the first 7–10 digit run at or after `start`. Suffix: the
/// **last** standalone 4-digit token anywhere after the prefix. Both are
/// required; the folio is their concatenation.
///
/// Returns `(folio, prefix_index, suffix_end_offset)`.
fn take_folio(tokens: &[Token], start: usize) -> (Option<String>, Option<usize>, Option<usize>) {
    let prefix_idx = tokens
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, t)| all_digits(t.text) && (7..=10).contains(&t.text.len()))
        .map(|(i, _)| i);
    let Some(prefix_idx) = prefix_idx else {
        return (None, None, None);
    };

    let suffix = tokens
        .iter()
        .skip(prefix_idx + 1)
        .filter(|t| all_digits(t.text) && t.text.len() == 4)
        .next_back();
    let Some(suffix) = suffix else {
        return (None, Some(prefix_idx), None);
    };

    let folio = format!("{}{}", tokens[prefix_idx].text, suffix.text);
    (Some(folio), Some(prefix_idx), Some(suffix.end))
}

/// Variant (first 3-digit token, 6-token window) then frequency (first
/// 1–3-digit token, 6-token window), each window starting where the
/// previous lookup left off. Returns the byte offset just past the
/// frequency token, or 0 when no frequency was found.
fn take_variant_frequency(tokens: &[Token], start: usize) -> (Option<i64>, Option<i64>, usize) {
    let mut pos = start;
    let mut variant = None;
    for k in pos..(pos + 6).min(tokens.len()) {
        if all_digits(tokens[k].text) && tokens[k].text.len() == 3 {
            variant = tokens[k].text.parse().ok();
            pos = k + 1;
            break;
        }
    }

    let mut frequency = None;
    let mut frequency_end = 0;
    for k in pos..(pos + 6).min(tokens.len()) {
        if all_digits(tokens[k].text) && tokens[k].text.len() <= 3 {
            frequency = tokens[k].text.parse().ok();
            frequency_end = tokens[k].end;
            break;
        }
    }
    (variant, frequency, frequency_end)
}

/// Parse one block tail into a [`Record`].
///
/// `tail` is the text following the anchor; `date` and `time` were already
/// consumed by the segmenter. Returns `None` when the block has no
/// recognizable folio (or an empty date): such blocks are silently
/// dropped, not errors.
pub fn parse_block(tail: &str, date: &str, time: Option<&str>) -> Option<Record> {
    if date.is_empty() {
        return None;
    }

    let block = clean_block_text(tail);
    let tokens = tokenize(&block);

    let (vehicle, pos) = take_vehicle(&tokens);
    let (plate, pos) = take_plate(&tokens, pos);
    let (folio, prefix_idx, suffix_end) = take_folio(&tokens, pos);
    let folio = folio?;

    let (variant, frequency, frequency_end) =
        take_variant_frequency(&tokens, prefix_idx.map(|i| i + 1).unwrap_or(pos));

    // AB | SD | CI: all three or none.
    let triple = TRIPLE_PIPE_RE.captures(&block);
    let (ab, sd, ci) = match &triple {
        Some(c) => match (
            c[1].parse::<i64>().ok(),
            c[2].parse::<i64>().ok(),
            c[3].parse::<i64>().ok(),
        ) {
            (Some(ab), Some(sd), Some(ci)) => (Some(ab), Some(sd), Some(ci)),
            _ => (None, None, None),
        },
        None => (None, None, None),
    };

    // Driver: between the frequency (or the anchor) and the triplet
    // marker, plus any alphabetic words the source printed after the folio
    // suffix.
    let mut driver_parts: Vec<String> = Vec::new();
    if let Some(c) = &triple {
        let triple_start = c.get(0).unwrap().start();
        if frequency_end < triple_start {
            let left = normalize_space(&block[frequency_end..triple_start]);
            if !left.is_empty() {
                driver_parts.push(left);
            }
        }
    }
    if let Some(suffix_end) = suffix_end {
        let continuation: Vec<&str> = LETTER_RUN_RE
            .find_iter(&block[suffix_end..])
            .map(|m| m.as_str())
            .collect();
        if !continuation.is_empty() {
            driver_parts.push(continuation.join(" "));
        }
    }
    let driver = if driver_parts.is_empty() {
        None
    } else {
        Some(driver_parts.join(" "))
    };

    // Percentage over the whole block; EV | TE only in what follows it.
    let pct_match = PCT_RE.captures(&block);
    let pct_ev = pct_match
        .as_ref()
        .and_then(|c| c[1].replace(',', ".").parse::<f64>().ok());
    let te = pct_match.as_ref().and_then(|c| {
        let after = &block[c.get(0).unwrap().end()..];
        PAIR_RE
            .captures(after)
            .and_then(|pair| pair[2].parse::<i64>().ok())
    });

    Some(Record {
        date: date.to_string(),
        time: time.map(str::to_string),
        vehicle,
        plate,
        folio,
        variant,
        frequency,
        driver,
        ab,
        sd,
        ci,
        pct_ev,
        te,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "01-02-2024";
    const TIME: Option<&str> = Some("08:15:00");

    fn parse(tail: &str) -> Option<Record> {
        parse_block(tail, DATE, TIME)
    }

    #[test]
    fn full_block_recovers_every_field() {
        let r = parse("12 DTCB66 123456789 021 15 JUAN PEREZ 5|3|1 98,5% 12|7 4321").unwrap();
        assert_eq!(r.date, DATE);
        assert_eq!(r.time.as_deref(), Some("08:15:00"));
        assert_eq!(r.vehicle, Some(12));
        assert_eq!(r.plate.as_deref(), Some("DTCB66"));
        assert_eq!(r.folio, "1234567894321");
        assert_eq!(r.variant, Some(21));
        assert_eq!(r.frequency, Some(15));
        assert_eq!(r.driver.as_deref(), Some("JUAN PEREZ"));
        assert_eq!((r.ab, r.sd, r.ci), (Some(5), Some(3), Some(1)));
        assert_eq!(r.pct_ev, Some(98.5));
        assert_eq!(r.te, Some(7));
    }

    #[test]
    fn missing_folio_rejects_the_block() {
        assert!(parse("12 DTCB66 JUAN PEREZ 5|3|1").is_none());
    }

    #[test]
    fn missing_suffix_rejects_the_block() {
        // Prefix present, but no standalone 4-digit token after it.
        assert!(parse("12 DTCB66 123456789 021 JUAN PEREZ").is_none());
    }

    #[test]
    fn empty_date_rejects_the_block() {
        assert!(parse_block("12 DTCB66 123456789 4321", "", None).is_none());
    }

    #[test]
    fn split_plate_is_reconstructed() {
        let r = parse("12 WXYZ1 2 123456789 4321").unwrap();
        assert_eq!(r.plate.as_deref(), Some("WXYZ12"));
    }

    #[test]
    fn unbroken_plate_matches_directly() {
        let r = parse("12 WXYZ12 123456789 4321").unwrap();
        assert_eq!(r.plate.as_deref(), Some("WXYZ12"));
    }

    #[test]
    fn plate_split_by_a_line_break_is_reconstructed() {
        let r = parse_block("12 WXYZ1\n2 123456789 4321", DATE, TIME).unwrap();
        assert_eq!(r.plate.as_deref(), Some("WXYZ12"));
    }

    #[test]
    fn plate_window_stops_before_the_folio() {
        // No plate before the 10+-digit folio run; letters after it must
        // not be misread as one.
        let r = parse("12 1234567890 ABCD12 4321").unwrap();
        assert_eq!(r.plate, None);
        assert_eq!(r.folio, "12345678904321");
    }

    #[test]
    fn folio_split_across_lines_is_rejoined() {
        let r = parse("12 WXYZ12 12345\n6789 021 15 4321").unwrap();
        assert_eq!(r.folio, "1234567894321");
    }

    #[test]
    fn folio_stitches_prefix_and_last_suffix() {
        let r = parse("12 WXYZ12 123456789 JUAN 1111 PEREZ 4321").unwrap();
        assert_eq!(r.folio, "1234567894321");
    }

    #[test]
    fn record_without_plate_still_gets_a_folio() {
        let r = parse("12 123456789 021 15 JUAN PEREZ 4321").unwrap();
        assert_eq!(r.plate, None);
        assert_eq!(r.folio, "1234567894321");
        assert_eq!(r.variant, Some(21));
    }

    #[test]
    fn partial_triplet_is_dropped_whole() {
        let r = parse("12 WXYZ12 123456789 5|3 4321").unwrap();
        assert_eq!((r.ab, r.sd, r.ci), (None, None, None));
    }

    #[test]
    fn te_is_only_read_after_the_percentage() {
        // The 12|7 pair precedes the % match and must be ignored.
        let r = parse("12 WXYZ12 123456789 12|7 98,5% 4321").unwrap();
        assert_eq!(r.pct_ev, Some(98.5));
        assert_eq!(r.te, None);
    }

    #[test]
    fn te_is_null_without_a_percentage() {
        let r = parse("12 WXYZ12 123456789 12|7 4321").unwrap();
        assert_eq!(r.pct_ev, None);
        assert_eq!(r.te, None);
    }

    #[test]
    fn percentage_accepts_dot_decimals() {
        let r = parse("12 WXYZ12 123456789 97.25% 3|4 4321").unwrap();
        assert_eq!(r.pct_ev, Some(97.25));
        assert_eq!(r.te, Some(4));
    }

    #[test]
    fn driver_continuation_after_suffix_is_appended() {
        let r = parse("12 WXYZ12 123456789 021 15 JUAN 5|3|1 4321 PEREZ").unwrap();
        assert_eq!(r.driver.as_deref(), Some("JUAN PEREZ"));
    }

    #[test]
    fn driver_without_triplet_keeps_only_the_continuation() {
        let r = parse("12 WXYZ12 123456789 021 15 JUAN 4321 PEREZ").unwrap();
        assert_eq!(r.driver.as_deref(), Some("PEREZ"));
    }

    #[test]
    fn driver_absent_when_nothing_remains() {
        let r = parse("12 WXYZ12 123456789 021 15 5|3|1 4321").unwrap();
        assert_eq!(r.driver, None);
    }
}
