//! `screenshot:<spec>` references in assistant replies
//!
//! A spec is a comma list whose items are a single id (`3`) or an
//! inclusive range (`2-4`, or `4-2` counting down). Every id in the spec
//! becomes its own reference.

const PREFIX: &str = "screenshot:";
/// Longest range we expand; larger ranges are left as plain text.
const MAX_RANGE_LEN: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Screenshot(i64),
}

pub fn chip_label(id: i64) -> String {
    format!("📷 Screenshot {}", id)
}

fn parse_item(item: &str) -> Option<Vec<i64>> {
    match item.split_once('-') {
        None => item.parse().ok().map(|id| vec![id]),
        Some((a, b)) => {
            let start: i64 = a.parse().ok()?;
            let end: i64 = b.parse().ok()?;
            if start.abs_diff(end) >= MAX_RANGE_LEN {
                return None;
            }
            Some(if start <= end {
                (start..=end).collect()
            } else {
                (end..=start).rev().collect()
            })
        }
    }
}

/// Expand a spec like `1,3-5` into ids. `None` when any item is malformed.
pub fn parse_spec(spec: &str) -> Option<Vec<i64>> {
    let mut ids = Vec::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        ids.extend(parse_item(item)?);
    }
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

/// Split text into plain runs and screenshot references.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_start = 0;
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(PREFIX) {
        let token_start = cursor + found;
        let spec_start = token_start + PREFIX.len();
        let spec_len = text[spec_start..]
            .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '-'))
            .unwrap_or(text.len() - spec_start);
        // trailing separators belong to the surrounding prose ("see screenshot:3, then")
        let spec = text[spec_start..spec_start + spec_len].trim_end_matches([',', '-']);
        let spec_end = spec_start + spec.len();

        match parse_spec(spec) {
            Some(ids) => {
                if plain_start < token_start {
                    out.push(Segment::Text(&text[plain_start..token_start]));
                }
                out.extend(ids.into_iter().map(Segment::Screenshot));
                plain_start = spec_end;
                cursor = spec_end;
            }
            None => cursor = spec_start,
        }
    }
    if plain_start < text.len() {
        out.push(Segment::Text(&text[plain_start..]));
    }
    out
}
