// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index field options.
//!
//! Legality per type:
//!
//! ```text
//! type     search          facet            result
//! text     fixed true      default false    default false
//! uint     fixed true      fixed false      fixed true
//! literal  default false   default false    default false
//! ```
//!
//! Facet and result may never both be enabled.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::FieldType;
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldOption {
    DefaultValue,
    FacetEnabled,
    ResultEnabled,
    SearchEnabled,
}

impl FieldOption {
    pub const ALL: [FieldOption; 4] = [
        FieldOption::DefaultValue,
        FieldOption::FacetEnabled,
        FieldOption::ResultEnabled,
        FieldOption::SearchEnabled,
    ];

    /// Name used in persisted metadata keys.
    pub fn snake_name(&self) -> &'static str {
        match self {
            FieldOption::DefaultValue => "default_value",
            FieldOption::FacetEnabled => "facet_enabled",
            FieldOption::ResultEnabled => "result_enabled",
            FieldOption::SearchEnabled => "search_enabled",
        }
    }

    pub fn from_snake_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.snake_name() == name)
    }

    /// Name used by the configuration API.
    pub fn api_name(&self) -> &'static str {
        match self {
            FieldOption::DefaultValue => "DefaultValue",
            FieldOption::FacetEnabled => "FacetEnabled",
            FieldOption::ResultEnabled => "ResultEnabled",
            FieldOption::SearchEnabled => "SearchEnabled",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.api_name() == name)
    }
}

/// Whether a boolean option can be changed for a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRule {
    Fixed(bool),
    Configurable { default: bool },
}

impl FieldType {
    /// Rule for a boolean option; `None` for `DefaultValue`.
    pub fn option_rule(&self, option: FieldOption) -> Option<OptionRule> {
        use FieldOption::*;
        use OptionRule::*;
        match (self, option) {
            (_, DefaultValue) => None,
            (FieldType::Text, SearchEnabled) => Some(Fixed(true)),
            (FieldType::Text, _) => Some(Configurable { default: false }),
            (FieldType::UInt, SearchEnabled) | (FieldType::UInt, ResultEnabled) => Some(Fixed(true)),
            (FieldType::UInt, FacetEnabled) => Some(Fixed(false)),
            (FieldType::Literal, _) => Some(Configurable { default: false }),
        }
    }
}

/// Effective options of one field, one variant per type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOptions {
    Text {
        facet_enabled: bool,
        result_enabled: bool,
        default_value: Option<String>,
    },
    UInt {
        default_value: Option<u32>,
    },
    Literal {
        search_enabled: bool,
        facet_enabled: bool,
        result_enabled: bool,
        default_value: Option<String>,
    },
}

fn parse_bool(field: &str, option: FieldOption, value: &Value) -> Result<bool, GatewayError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(GatewayError::validation(format!(
            "Value '{}' for {} of field '{}' is not a boolean",
            other,
            option.api_name(),
            field
        ))),
    }
}

fn parse_uint(field: &str, value: &Value) -> Result<u32, GatewayError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        GatewayError::validation(format!(
            "Value '{}' for DefaultValue of field '{}' is not an unsigned integer",
            value, field
        ))
    })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FieldOptions {
    pub fn defaults(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => FieldOptions::Text {
                facet_enabled: false,
                result_enabled: false,
                default_value: None,
            },
            FieldType::UInt => FieldOptions::UInt { default_value: None },
            FieldType::Literal => FieldOptions::Literal {
                search_enabled: false,
                facet_enabled: false,
                result_enabled: false,
                default_value: None,
            },
        }
    }

    /// Build from stored values, rejecting illegal ones.
    pub fn from_values(
        field: &str,
        field_type: FieldType,
        values: &BTreeMap<FieldOption, Value>,
    ) -> Result<Self, GatewayError> {
        let mut options = Self::defaults(field_type);
        for (option, value) in values {
            options.apply(field, *option, value)?;
        }
        options.check_conflicts(field)?;
        Ok(options)
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldOptions::Text { .. } => FieldType::Text,
            FieldOptions::UInt { .. } => FieldType::UInt,
            FieldOptions::Literal { .. } => FieldType::Literal,
        }
    }

    pub fn search_enabled(&self) -> bool {
        match self {
            FieldOptions::Literal { search_enabled, .. } => *search_enabled,
            _ => true,
        }
    }

    pub fn facet_enabled(&self) -> bool {
        match self {
            FieldOptions::Text { facet_enabled, .. } | FieldOptions::Literal { facet_enabled, .. } => *facet_enabled,
            FieldOptions::UInt { .. } => false,
        }
    }

    pub fn result_enabled(&self) -> bool {
        match self {
            FieldOptions::Text { result_enabled, .. } | FieldOptions::Literal { result_enabled, .. } => {
                *result_enabled
            }
            FieldOptions::UInt { .. } => true,
        }
    }

    pub fn default_value(&self) -> Option<Value> {
        match self {
            FieldOptions::Text { default_value, .. } | FieldOptions::Literal { default_value, .. } => {
                default_value.clone().map(Value::from)
            }
            FieldOptions::UInt { default_value } => default_value.map(Value::from),
        }
    }

    pub fn get(&self, option: FieldOption) -> Value {
        match option {
            FieldOption::DefaultValue => self.default_value().unwrap_or(Value::Null),
            FieldOption::FacetEnabled => Value::Bool(self.facet_enabled()),
            FieldOption::ResultEnabled => Value::Bool(self.result_enabled()),
            FieldOption::SearchEnabled => Value::Bool(self.search_enabled()),
        }
    }

    /// Set one option. Fixed options only accept their fixed value.
    pub fn apply(&mut self, field: &str, option: FieldOption, value: &Value) -> Result<(), GatewayError> {
        let field_type = self.field_type();
        if let Some(OptionRule::Fixed(fixed)) = field_type.option_rule(option) {
            let requested = parse_bool(field, option, value)?;
            if requested != fixed {
                return Err(GatewayError::FieldOptionConflict(format!(
                    "Error defining field: {}. {} is always {} for {} fields",
                    field,
                    option.api_name(),
                    fixed,
                    field_type
                )));
            }
            return Ok(());
        }

        match (self, option) {
            (FieldOptions::UInt { default_value }, FieldOption::DefaultValue) => {
                *default_value = if value.is_null() { None } else { Some(parse_uint(field, value)?) };
            }
            (
                FieldOptions::Text { default_value, .. } | FieldOptions::Literal { default_value, .. },
                FieldOption::DefaultValue,
            ) => {
                *default_value = if value.is_null() { None } else { Some(text_of(value)) };
            }
            (
                FieldOptions::Text { facet_enabled, .. } | FieldOptions::Literal { facet_enabled, .. },
                FieldOption::FacetEnabled,
            ) => *facet_enabled = parse_bool(field, option, value)?,
            (
                FieldOptions::Text { result_enabled, .. } | FieldOptions::Literal { result_enabled, .. },
                FieldOption::ResultEnabled,
            ) => *result_enabled = parse_bool(field, option, value)?,
            (FieldOptions::Literal { search_enabled, .. }, FieldOption::SearchEnabled) => {
                *search_enabled = parse_bool(field, option, value)?
            }
            // Remaining combinations are fixed and handled above.
            _ => {}
        }
        Ok(())
    }

    pub fn check_conflicts(&self, field: &str) -> Result<(), GatewayError> {
        if self.facet_enabled() && self.result_enabled() {
            return Err(GatewayError::FieldOptionConflict(format!(
                "Error defining field: {}. An IndexField may not be both FacetEnabled and ResultEnabled",
                field
            )));
        }
        Ok(())
    }

    /// Configuration API shape, e.g. `{"TextOptions": {...}}`.
    pub fn to_api_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(default) = self.default_value() {
            body.insert("DefaultValue".to_string(), default);
        }
        match self {
            FieldOptions::Text { facet_enabled, result_enabled, .. } => {
                body.insert("FacetEnabled".to_string(), json!(facet_enabled));
                body.insert("ResultEnabled".to_string(), json!(result_enabled));
                json!({ "TextOptions": body })
            }
            FieldOptions::UInt { .. } => json!({ "UIntOptions": body }),
            FieldOptions::Literal { search_enabled, facet_enabled, result_enabled, .. } => {
                body.insert("SearchEnabled".to_string(), json!(search_enabled));
                body.insert("FacetEnabled".to_string(), json!(facet_enabled));
                body.insert("ResultEnabled".to_string(), json!(result_enabled));
                json!({ "LiteralOptions": body })
            }
        }
    }
}

/// Uncommitted option writes. `None` marks an option to unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionChangeSet {
    changes: BTreeMap<FieldOption, Option<Value>>,
}

impl OptionChangeSet {
    pub fn set(&mut self, option: FieldOption, value: Value) {
        self.changes.insert(option, Some(value));
    }

    pub fn unset(&mut self, option: FieldOption) {
        self.changes.insert(option, None);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldOption, &Option<Value>)> {
        self.changes.iter()
    }

    /// Persisted values with pending changes laid over them.
    pub fn merged(&self, persisted: &BTreeMap<FieldOption, Value>) -> BTreeMap<FieldOption, Value> {
        let mut merged = persisted.clone();
        for (option, change) in &self.changes {
            match change {
                Some(value) => {
                    merged.insert(*option, value.clone());
                }
                None => {
                    merged.remove(option);
                }
            }
        }
        merged
    }
}
