//! JSON export of a persisted snapshot

use crate::storage::{Source, Storage};
use crate::ScrapeError;
use std::io::Write;

/// Writes the persisted collection for `source` as a pretty JSON array
///
/// Records keep their listing order. Absent fields are written as `null`.
///
/// # Returns
///
/// * `Ok(usize)` - Number of records written
/// * `Err(ScrapeError)` - The snapshot could not be read or written
pub fn export_json<W: Write>(
    storage: &dyn Storage,
    source: Source,
    mut writer: W,
) -> Result<usize, ScrapeError> {
    let count = match source {
        Source::Books => {
            let books = storage.load_books()?;
            serde_json::to_writer_pretty(&mut writer, &books)?;
            books.len()
        }
        Source::Quotes => {
            let quotes = storage.load_quotes()?;
            serde_json::to_writer_pretty(&mut writer, &quotes)?;
            quotes.len()
        }
    };

    writeln!(writer)?;
    tracing::debug!("Exported {} {} records", count, source);
    Ok(count)
}
