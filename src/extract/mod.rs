//! Field extraction rules
//!
//! A [`FieldRule`] selects one piece of text out of a parsed document or
//! fragment. Rules are a closed set of variants and every one of them is a
//! pure function of the fragment: a selector that matches nothing, a missing
//! attribute or an empty cell all produce `None`, never an error. Typed
//! values are derived from the selected text by the normalizers in
//! [`normalize`].

pub mod normalize;

pub use normalize::{collapse_whitespace, count_value, currency_value, truncate, ELLIPSIS};

use crate::records::Price;
use crate::ScrapeError;
use scraper::{ElementRef, Selector};

/// Compiles a CSS selector, reporting the offending selector on failure
pub fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// A selection rule yielding an optional string
#[derive(Debug, Clone)]
pub enum FieldRule {
    /// Visible text of the first match, whitespace collapsed
    Text(Selector),

    /// Raw value of an attribute on the first match
    Attr {
        selector: Selector,
        name: &'static str,
    },

    /// Class list of the first match with one known token removed
    ClassRemainder {
        selector: Selector,
        prefix: &'static str,
    },

    /// Visible text of the match at a fixed position
    NthText { selector: Selector, index: usize },

    /// Visible text of the first element sibling after an anchor
    NextSiblingText { anchor: Selector },

    /// Second cell of the table row whose first cell carries `label`
    TableCell {
        rows: Selector,
        cells: Selector,
        label: &'static str,
    },
}

impl FieldRule {
    pub fn text(selector: &str) -> Result<Self, ScrapeError> {
        Ok(Self::Text(compile(selector)?))
    }

    pub fn attr(selector: &str, name: &'static str) -> Result<Self, ScrapeError> {
        Ok(Self::Attr {
            selector: compile(selector)?,
            name,
        })
    }

    pub fn class_remainder(selector: &str, prefix: &'static str) -> Result<Self, ScrapeError> {
        Ok(Self::ClassRemainder {
            selector: compile(selector)?,
            prefix,
        })
    }

    pub fn nth_text(selector: &str, index: usize) -> Result<Self, ScrapeError> {
        Ok(Self::NthText {
            selector: compile(selector)?,
            index,
        })
    }

    pub fn next_sibling_text(anchor: &str) -> Result<Self, ScrapeError> {
        Ok(Self::NextSiblingText {
            anchor: compile(anchor)?,
        })
    }

    /// Looks up `label` in any `<table>` row of the scope
    pub fn table_cell(label: &'static str) -> Result<Self, ScrapeError> {
        Ok(Self::TableCell {
            rows: compile("table tr")?,
            cells: compile("th, td")?,
            label,
        })
    }

    /// Runs the rule against `scope`
    pub fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        match self {
            Self::Text(selector) => scope.select(selector).next().and_then(visible_text),

            Self::Attr { selector, name } => scope
                .select(selector)
                .next()
                .and_then(|el| el.value().attr(name))
                .map(str::to_string),

            Self::ClassRemainder { selector, prefix } => {
                let class = scope.select(selector).next()?.value().attr("class")?;
                let remainder = class
                    .split_whitespace()
                    .filter(|token| token != prefix)
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(remainder).filter(|r| !r.is_empty())
            }

            Self::NthText { selector, index } => {
                scope.select(selector).nth(*index).and_then(visible_text)
            }

            Self::NextSiblingText { anchor } => scope
                .select(anchor)
                .next()?
                .next_siblings()
                .find_map(ElementRef::wrap)
                .and_then(visible_text),

            Self::TableCell { rows, cells, label } => table_lookup(scope, rows, cells, label),
        }
    }

    /// Runs the rule and reads the result as a currency amount
    pub fn extract_price(&self, scope: ElementRef<'_>) -> Option<Price> {
        self.extract(scope).as_deref().and_then(currency_value)
    }

    /// Runs the rule and reads the result as a non-negative integer
    pub fn extract_count(&self, scope: ElementRef<'_>) -> Option<u32> {
        self.extract(scope).as_deref().and_then(count_value)
    }
}

/// Visible text of every match of `selector`, in document order
///
/// Matches with no visible text are skipped.
pub fn all_text(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope.select(selector).filter_map(visible_text).collect()
}

fn visible_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    Some(text).filter(|t| !t.is_empty())
}

fn table_lookup(
    scope: ElementRef<'_>,
    rows: &Selector,
    cells: &Selector,
    label: &str,
) -> Option<String> {
    let pairs: Vec<(String, ElementRef<'_>)> = scope
        .select(rows)
        .filter_map(|row| {
            let mut row_cells = row.select(cells);
            let head = row_cells.next()?;
            let value = row_cells.next()?;
            let head_text = collapse_whitespace(&head.text().collect::<String>());
            Some((head_text, value))
        })
        .collect();

    // Exact label match wins over a containing one
    let exact = pairs.iter().find(|(head, _)| head == label);
    let row = exact.or_else(|| pairs.iter().find(|(head, _)| head.contains(label)))?;

    visible_text(row.1)
}
