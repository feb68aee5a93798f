// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-place field migrations.
//!
//! Changing a field's type or multiplicity rewrites its storage:
//!
//! ```text
//! Live --dump--> Dumped --delete--> Removed --create--> Recreated --load--> Reloaded (Live')
//! ```
//!
//! Nothing is locked and nothing is rolled back. A failure reports the last
//! phase reached, which tells the operator what state the field was left in.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{FieldOption, FieldOptions, FieldType, IndexField};
use crate::engine::SelectOptions;
use crate::error::{GatewayError, MigrationPhase, Result};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationKind {
    ChangeType,
    MultipleValues,
}

impl MigrationKind {
    fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::ChangeType => "change_type",
            MigrationKind::MultipleValues => "multiple_values",
        }
    }
}

fn scalar_to(value: &Value, to: FieldType) -> Value {
    match to {
        FieldType::Text | FieldType::Literal => match value {
            Value::String(s) => Value::String(s.clone()),
            Value::Null => Value::String(String::new()),
            other => Value::String(other.to_string()),
        },
        FieldType::UInt => {
            let parsed = match value {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Value::String(s) => s.trim().parse::<u32>().ok(),
                _ => None,
            };
            Value::from(parsed.unwrap_or(0))
        }
    }
}

/// Convert a stored value to another field type.
///
/// Text and literal stringify; uint parses and falls back to `0`. Vectors are
/// converted element-wise.
pub fn coerce_value(value: &Value, to: FieldType) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|item| scalar_to(item, to)).collect()),
        scalar => scalar_to(scalar, to),
    }
}

/// Promote a scalar value to a one-element vector. Empty text becomes empty.
fn promote(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items),
        Value::String(s) if s.is_empty() => Value::Array(Vec::new()),
        Value::Null => Value::Array(Vec::new()),
        scalar => Value::Array(vec![scalar]),
    }
}

impl IndexField<'_> {
    /// Change the field's type, converting every stored value.
    pub async fn change_type(&mut self, new_type: FieldType) -> Result<()> {
        if new_type == self.field_type {
            return Ok(());
        }
        let multiple_values = self.multiple_values;
        self.migrate(MigrationKind::ChangeType, new_type, multiple_values).await
    }

    /// Turn a scalar field into a vector field, keeping every stored value.
    pub async fn upgrade_to_multiple_values(&mut self) -> Result<()> {
        if self.multiple_values {
            return Ok(());
        }
        let field_type = self.field_type;
        self.migrate(MigrationKind::MultipleValues, field_type, true).await
    }

    async fn migrate(&mut self, kind: MigrationKind, field_type: FieldType, multiple_values: bool) -> Result<()> {
        let domain = self.domain.name().to_string();
        let mut phase = MigrationPhase::Live;
        info!(
            domain = %domain,
            field = %self.name,
            kind = kind.as_str(),
            from = %self.field_type,
            to = %field_type,
            "Starting field migration"
        );

        let result = self.run_migration(&mut phase, field_type, multiple_values).await;
        match result {
            Ok(()) => {
                metrics::record_field_migration(kind.as_str(), phase.as_str());
                info!(domain = %domain, field = %self.name, kind = kind.as_str(), "Field migration complete");
                Ok(())
            }
            Err(err) => {
                metrics::record_field_migration(kind.as_str(), "failed");
                warn!(
                    domain = %domain,
                    field = %self.name,
                    kind = kind.as_str(),
                    phase = %phase,
                    error = %err,
                    "Field migration failed, field left as reached"
                );
                Err(match err {
                    GatewayError::Engine(source) => GatewayError::Migration {
                        field: self.name.clone(),
                        phase,
                        source,
                    },
                    other => other,
                })
            }
        }
    }

    async fn run_migration(
        &mut self,
        phase: &mut MigrationPhase,
        field_type: FieldType,
        multiple_values: bool,
    ) -> Result<()> {
        let engine = self.domain.engine().clone();
        let table = self.domain.table_name().to_string();

        let dumped = engine
            .select(SelectOptions::all(&table, &["_key", self.name.as_str()]))
            .await?;
        let options = self.persisted_options().await?;
        *phase = MigrationPhase::Dumped;
        warn!(field = %self.name, rows = dumped.records.len(), phase = %phase, "Migration phase reached");

        self.delete().await?;
        *phase = MigrationPhase::Removed;
        warn!(field = %self.name, phase = %phase, "Migration phase reached");

        self.field_type = field_type;
        self.multiple_values = multiple_values;
        self.create().await?;
        self.restore_options(&options).await?;
        *phase = MigrationPhase::Recreated;
        warn!(field = %self.name, phase = %phase, "Migration phase reached");

        let records: Vec<Map<String, Value>> = dumped
            .records
            .rows
            .iter()
            .filter_map(|row| {
                let key = row.first()?.clone();
                let value = coerce_value(row.get(1)?, field_type);
                let value = if multiple_values { promote(value) } else { value };
                let mut record = Map::new();
                record.insert("_key".to_string(), key);
                record.insert(self.name.clone(), value);
                Some(record)
            })
            .collect();
        if !records.is_empty() {
            engine.load(&table, records).await?;
        }
        *phase = MigrationPhase::Reloaded;
        self.touch().await?;
        Ok(())
    }

    /// Re-apply the options that remain legal for the new type.
    async fn restore_options(&self, previous: &BTreeMap<FieldOption, Value>) -> Result<()> {
        let mut options = FieldOptions::defaults(self.field_type);
        let mut kept = BTreeMap::new();
        for (option, value) in previous {
            let mut candidate = options.clone();
            if candidate.apply(&self.name, *option, value).is_ok() && candidate.check_conflicts(&self.name).is_ok() {
                options = candidate;
                kept.insert(*option, value.clone());
            }
        }
        let config = self.domain.config();
        for (option, value) in &kept {
            config.set(&self.option_key(*option), value).await?;
        }
        self.write_stored_options(&kept).await
    }
}
