//! Pure text and number normalizers applied after selection

use crate::records::Price;

/// Marker appended to truncated text
pub const ELLIPSIS: &str = "...";

/// Collapses every run of whitespace into a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts a currency amount from display text such as `"£51.77"`
///
/// Every character that is not an ASCII digit or `.` is dropped first.
/// Empty remainders and remainders that do not form a single decimal
/// number (for instance `"1.2.3"`) yield `None` rather than an error, so a
/// garbled price never aborts the item it belongs to.
pub fn currency_value(text: &str) -> Option<Price> {
    let numeric: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if numeric.is_empty() {
        return None;
    }

    Price::parse(&numeric)
}

/// Parses trimmed text as a non-negative integer, `None` on failure
pub fn count_value(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// Caps `text` at `max` characters
///
/// Text that fits is returned unchanged. Otherwise the result is exactly
/// `max` characters long and ends in [`ELLIPSIS`], unless `max` is too small
/// to hold the marker, in which case the first `max` characters are
/// returned bare.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    if max <= ELLIPSIS.len() {
        return text.chars().take(max).collect();
    }

    let mut out: String = text.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}
