//! Core domain types for the dataset catalog.

use serde::{Deserialize, Serialize};

use crate::column_type::ColumnType;

/// Phrase whose presence in a column description marks it nullable.
pub const NULL_PHRASE: &str = "field can be null";

/// Suffix appended to a nullable column's description.
pub const NULL_SUFFIX: &str = "Field can be null.";

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// One documentation page and the dataset headings it last yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique module name (catalog key).
    pub name: String,
    /// Documentation page URL.
    pub url: String,
    /// Dataset headings (`Dataset::module_name`) from the last harvest, in page order.
    #[serde(default)]
    pub datasets: Vec<String>,
}

impl Module {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            datasets: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One schema table definition harvested from a heading/table pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Stable surrogate key, assigned at first discovery.
    pub name: String,
    /// Heading text as published; the reconciliation join key.
    pub module_name: String,
    pub sql_table_name: String,
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub table_name: String,
    /// Module URL plus the heading anchor.
    pub url: String,
    pub description: String,
    pub columns: ColumnSet,
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// One field definition within a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ColumnFields")]
pub struct Column {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub size: String,
    pub is_primary: bool,
    pub is_foreign: bool,
    pub can_be_null: bool,
    pub version_history: String,
}

/// Raw column values before flag inference.
///
/// Flags left as `None` are inferred: key flags from the key cell text,
/// nullability from the description.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub is_primary: Option<bool>,
    #[serde(default)]
    pub is_foreign: Option<bool>,
    #[serde(default)]
    pub can_be_null: Option<bool>,
    #[serde(default)]
    pub version_history: String,
}

impl Column {
    /// Build a column, inferring any flag that was not supplied.
    pub fn from_fields(fields: ColumnFields) -> Self {
        let key = fields.key.to_uppercase();
        let is_primary = fields.is_primary.unwrap_or_else(|| key.contains("PK"));
        let is_foreign = fields.is_foreign.unwrap_or_else(|| key.contains("FK"));
        let can_be_null = fields
            .can_be_null
            .unwrap_or_else(|| mentions_null(&fields.description));

        Self {
            name: fields.name,
            description: with_null_suffix(&fields.description, can_be_null),
            column_type: fields.column_type,
            size: fields.size,
            is_primary,
            is_foreign,
            can_be_null,
            version_history: fields.version_history,
        }
    }
}

impl From<ColumnFields> for Column {
    fn from(fields: ColumnFields) -> Self {
        Column::from_fields(fields)
    }
}

/// Case-insensitive check for the null phrase.
pub fn mentions_null(description: &str) -> bool {
    description.to_lowercase().contains(NULL_PHRASE)
}

/// Append [`NULL_SUFFIX`] to a nullable column's description unless it
/// already mentions the phrase. Applying this twice is the same as once.
pub fn with_null_suffix(description: &str, can_be_null: bool) -> String {
    if !can_be_null || mentions_null(description) {
        return description.to_string();
    }
    if description.trim().is_empty() {
        NULL_SUFFIX.to_string()
    } else {
        format!("{description} {NULL_SUFFIX}")
    }
}

// ---------------------------------------------------------------------------
// ColumnSet
// ---------------------------------------------------------------------------

/// Columns keyed by name, in insertion order.
///
/// Persisted as a plain array of column objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column. A column with the same name is replaced in place.
    pub fn insert(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl From<Vec<Column>> for ColumnSet {
    fn from(columns: Vec<Column>) -> Self {
        columns.into_iter().collect()
    }
}

impl From<ColumnSet> for Vec<Column> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}

impl FromIterator<Column> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        let mut set = ColumnSet::new();
        for column in iter {
            set.insert(column);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
