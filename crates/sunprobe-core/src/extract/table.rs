// HTML table cells.
//
// Each row's text is scanned with the unit-anchored pattern; the first
// cell, when it is a plain caption, labels the readings of its row.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text::readings;
use crate::model::{ExtractionMethod, RawExtractionRecord};

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

const MAX_LABEL_LEN: usize = 40;

/// Emit `table_<t>_<label>_<n>_<unit>` keys for every reading in every table.
pub(crate) fn extract_tables(document: &Html, record: &mut RawExtractionRecord) {
    for (t, table) in document.select(&TABLE).enumerate() {
        let mut n = 0usize;
        for (r, row) in table.select(&ROW).enumerate() {
            let cells: Vec<String> = row.select(&CELL).map(cell_text).collect();
            let Some(first) = cells.first() else {
                continue;
            };

            let label = if readings(first).is_empty() {
                slug(first)
            } else {
                String::new()
            };
            let label = if label.is_empty() {
                format!("row{}", r + 1)
            } else {
                label
            };

            for reading in readings(&cells.join(" ")) {
                n += 1;
                record.insert(
                    format!("table_{}_{}_{}_{}", t + 1, label, n, reading.unit),
                    reading.value,
                    ExtractionMethod::HtmlTable,
                );
            }
        }
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-case, underscore-separated form of a caption.
fn slug(caption: &str) -> String {
    let mut out = String::new();
    for c in caption.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        if out.chars().count() >= MAX_LABEL_LEN {
            break;
        }
    }
    out.trim_end_matches('_').to_owned()
}
