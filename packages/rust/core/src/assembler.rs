//! Dataset and column assembly: raw parsed fields in, catalog entities out.
//!
//! Identity rules for a heading `H`:
//! - `name`: `H` without non-alphanumeric/non-space characters, then without spaces
//! - `sql_table_name`: prefix + uppercase of the filtered heading, spaces as `_`
//! - `url`: module URL + `#` + lowercase `H` with spaces as `-`

use schemaharvest_parser::{ColumnRecord, RawDataset};
use schemaharvest_shared::{AssemblerConfig, Column, ColumnFields, ColumnSet, Dataset};

/// Builds [`Dataset`]s from [`RawDataset`]s with a fixed boilerplate table.
#[derive(Debug, Clone)]
pub struct Assembler {
    boilerplate: Vec<String>,
    sql_table_prefix: String,
}

impl Assembler {
    pub fn new(config: &AssemblerConfig) -> Self {
        Self {
            boilerplate: config
                .boilerplate_paragraphs
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
            sql_table_prefix: config.sql_table_prefix.clone(),
        }
    }

    /// Assemble one dataset of the module at `module_url`.
    ///
    /// The auxiliary names (`api_name`, `entity_name`, `table_name`) get their
    /// first-discovery defaults; the reconciler keeps whatever the catalog
    /// already holds for an existing dataset.
    pub fn assemble(&self, module_url: &str, raw: RawDataset) -> Dataset {
        let name = dataset_name(&raw.heading);
        let sql_table_name = sql_table_name(&self.sql_table_prefix, &raw.heading);
        let url = dataset_url(module_url, &raw.heading);
        let description = self.description(&raw.paragraphs);

        let columns: ColumnSet = raw.columns.into_iter().map(assemble_column).collect();

        Dataset {
            entity_name: name.clone(),
            table_name: sql_table_name.to_lowercase(),
            api_name: raw.heading.clone(),
            name,
            module_name: raw.heading,
            sql_table_name,
            url,
            description,
            columns,
        }
    }

    /// Assemble every dataset of one module, keeping page order.
    pub fn assemble_all(&self, module_url: &str, raws: Vec<RawDataset>) -> Vec<Dataset> {
        raws.into_iter()
            .map(|raw| self.assemble(module_url, raw))
            .collect()
    }

    /// Join the non-boilerplate paragraphs with single spaces.
    pub fn description(&self, paragraphs: &[String]) -> String {
        paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && !self.is_boilerplate(p))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn is_boilerplate(&self, paragraph: &str) -> bool {
        let lowered = paragraph.to_lowercase();
        self.boilerplate.iter().any(|b| *b == lowered)
    }
}

/// Column from one table row, with key and null flags inferred.
pub fn assemble_column(record: ColumnRecord) -> Column {
    Column::from_fields(ColumnFields {
        name: record.name,
        description: record.description,
        column_type: record.column_type,
        size: record.size,
        key: record.key,
        is_primary: None,
        is_foreign: None,
        can_be_null: None,
        version_history: record.version_history,
    })
}

fn filtered_heading(heading: &str) -> String {
    heading
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// Stable dataset key derived from a heading.
pub fn dataset_name(heading: &str) -> String {
    filtered_heading(heading).replace(' ', "")
}

/// SQL table name derived from a heading.
pub fn sql_table_name(prefix: &str, heading: &str) -> String {
    format!(
        "{prefix}{}",
        filtered_heading(heading).replace(' ', "_").to_uppercase()
    )
}

/// Module URL with the heading's anchor fragment. Any existing fragment is replaced.
pub fn dataset_url(module_url: &str, heading: &str) -> String {
    let base = module_url.split('#').next().unwrap_or(module_url);
    let anchor = heading.to_lowercase().replace(' ', "-");
    format!("{base}#{anchor}")
}
