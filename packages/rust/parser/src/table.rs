//! Column table parsing.
//!
//! Each body row maps positionally to
//! `version history | name | description | type | size | key`.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use schemaharvest_shared::{ColumnType, HarvestError, Result, resolve};

use crate::navigator::has_header;
use crate::text::clean_text;

/// Cells every column row must have.
pub const COLUMN_CELLS: usize = 6;

static P_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

/// One typed row of a column table, before flag inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub version_history: String,
    pub name: String,
    pub description: String,
    pub column_type: ColumnType,
    pub size: String,
    /// Raw key cell text (e.g. `PK`, `PK, FK`).
    pub key: String,
}

/// Parse every body row of a column table.
///
/// A row with the wrong number of cells, or a type token the resolver does
/// not know, fails the whole table.
pub fn parse_column_table(table: ElementRef<'_>) -> Result<Vec<ColumnRecord>> {
    if !has_header(table) {
        return Err(HarvestError::structure("column table has no header section"));
    }

    let mut records = Vec::new();

    for (index, row) in body_rows(table).enumerate() {
        let cells: Vec<String> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| matches!(el.value().name(), "td" | "th"))
            .map(cell_text)
            .collect();

        let [version_history, name, description, raw_type, size, key]: [String; COLUMN_CELLS] =
            cells.try_into().map_err(|cells: Vec<String>| {
                HarvestError::shape(format!(
                    "row {} has {} cells, expected {COLUMN_CELLS}",
                    index + 1,
                    cells.len()
                ))
            })?;

        records.push(ColumnRecord {
            column_type: resolve(&raw_type)?,
            version_history,
            name,
            description,
            size,
            key,
        });
    }

    Ok(records)
}

/// `tr` rows of every `tbody` section, in order.
fn body_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tbody")
        .flat_map(|body| body.children().filter_map(ElementRef::wrap))
        .filter(|el| el.value().name() == "tr")
}

/// Cell text, preferring nested paragraphs over the cell's own text.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    let from_paragraphs = cell
        .select(&P_SEL)
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if from_paragraphs.is_empty() {
        clean_text(cell)
    } else {
        from_paragraphs
    }
}
