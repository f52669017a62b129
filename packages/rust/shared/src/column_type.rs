//! Canonical column types and the raw-token resolver.

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// The closed set of column types a dataset column may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ColumnType {
    Bigint,
    Bit,
    Datetime2,
    Decimal,
    Float,
    Int,
    Nvarchar,
    Smallint,
    Varchar,
    Uniqueidentifier,
}

/// Every canonical type, in declaration order.
pub const ALL_COLUMN_TYPES: [ColumnType; 10] = [
    ColumnType::Bigint,
    ColumnType::Bit,
    ColumnType::Datetime2,
    ColumnType::Decimal,
    ColumnType::Float,
    ColumnType::Int,
    ColumnType::Nvarchar,
    ColumnType::Smallint,
    ColumnType::Varchar,
    ColumnType::Uniqueidentifier,
];

/// Raw tokens seen in the documentation that stand for a canonical type.
///
/// `navchar` is a misspelling that actually appears in the published pages.
pub const COLUMN_TYPE_SYNONYMS: [(&str, ColumnType); 3] = [
    ("integer", ColumnType::Int),
    ("navchar", ColumnType::Nvarchar),
    ("datetime", ColumnType::Datetime2),
];

impl ColumnType {
    /// Canonical lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bigint => "bigint",
            Self::Bit => "bit",
            Self::Datetime2 => "datetime2",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Int => "int",
            Self::Nvarchar => "nvarchar",
            Self::Smallint => "smallint",
            Self::Varchar => "varchar",
            Self::Uniqueidentifier => "uniqueidentifier",
        }
    }
}

/// Resolve a raw type token into a [`ColumnType`].
///
/// Matching is case-insensitive on the trimmed token. Synonyms are checked
/// first; anything that is neither a synonym nor a canonical name fails.
pub fn resolve(raw: &str) -> Result<ColumnType> {
    let token = raw.trim().to_lowercase();

    if let Some((_, ty)) = COLUMN_TYPE_SYNONYMS.iter().find(|(s, _)| *s == token) {
        return Ok(*ty);
    }

    ALL_COLUMN_TYPES
        .iter()
        .copied()
        .find(|ty| ty.as_str() == token)
        .ok_or_else(|| HarvestError::UnknownColumnType {
            token: raw.to_string(),
        })
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        resolve(s)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = HarvestError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        resolve(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_names_case_insensitively() {
        assert_eq!(resolve("int").unwrap(), ColumnType::Int);
        assert_eq!(resolve("NVARCHAR").unwrap(), ColumnType::Nvarchar);
        assert_eq!(resolve(" UniqueIdentifier ").unwrap(), ColumnType::Uniqueidentifier);
        for ty in ALL_COLUMN_TYPES {
            assert_eq!(resolve(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn resolves_synonyms() {
        assert_eq!(resolve("integer").unwrap(), ColumnType::Int);
        assert_eq!(resolve("Navchar").unwrap(), ColumnType::Nvarchar);
        assert_eq!(resolve("DateTime").unwrap(), ColumnType::Datetime2);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let err = resolve("money").unwrap_err();
        assert!(matches!(err, HarvestError::UnknownColumnType { ref token } if token == "money"));
        assert!(resolve("").is_err());
        assert!(resolve("varchar(255)").is_err());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&ColumnType::Datetime2).unwrap();
        assert_eq!(json, "\"datetime2\"");

        let parsed: ColumnType = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(parsed, ColumnType::Int);

        assert!(serde_json::from_str::<ColumnType>("\"text\"").is_err());
    }
}
