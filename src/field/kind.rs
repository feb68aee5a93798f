// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::{ColumnInfo, ColumnKind};
use crate::error::ValidationError;

/// Index field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Full-text searchable, tokenized through the domain's bigram terms table.
    Text,
    /// Unsigned 32-bit integer, range filterable and sortable.
    UInt,
    /// Exact-match string, stored as a reference into a lookup table.
    Literal,
}

impl FieldType {
    pub const ALL: [FieldType; 3] = [FieldType::Text, FieldType::UInt, FieldType::Literal];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::UInt => "uint",
            FieldType::Literal => "literal",
        }
    }

    /// Engine value type of the field column.
    pub fn column_type(&self, lookup_table: &str) -> String {
        match self {
            FieldType::Text => "Text".to_string(),
            FieldType::UInt => "UInt32".to_string(),
            FieldType::Literal => lookup_table.to_string(),
        }
    }

    /// Key type of the per-field lookup table, if the type has one.
    pub fn lookup_key_type(&self) -> Option<&'static str> {
        match self {
            FieldType::Text => None,
            FieldType::UInt => Some("UInt32"),
            FieldType::Literal => Some("ShortText"),
        }
    }

    /// Read type and multiplicity back from a column definition.
    pub fn detect(column: &ColumnInfo) -> (FieldType, bool) {
        let field_type = match column.value_type.as_str() {
            "Text" | "ShortText" | "LongText" => FieldType::Text,
            "UInt32" | "UInt64" | "Int32" | "Int64" => FieldType::UInt,
            _ => FieldType::Literal,
        };
        (field_type, column.kind == ColumnKind::Vector)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldType::Text),
            "uint" => Ok(FieldType::UInt),
            "literal" => Ok(FieldType::Literal),
            other => Err(ValidationError::single(format!(
                "Value '{}' at 'indexField.indexFieldType' failed to satisfy constraint: \
                 Member must satisfy enum value set: [text, literal, uint]",
                other
            ))),
        }
    }
}
