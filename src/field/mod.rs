// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index fields.
//!
//! An [`IndexField`] is a handle onto one field of a [`Domain`]. It owns no
//! engine state itself: the column on the domain table, the reverse index and
//! (for `uint`/`literal`) the lookup table are the source of truth, and
//! options and audit stamps live in the domain's configuration store under
//! `column_<field>_<option>` keys.
//!
//! ```text
//! text     companies.name     -> index companies_BigramTerms.companies_name
//! uint     companies.age      -> index companies_index_age.companies_age   (UInt32 keys)
//! literal  companies.product  -> index companies_index_product.companies_product
//!                                (column references companies_index_product)
//! ```

mod kind;
mod migrate;
mod options;

pub use kind::FieldType;
pub use migrate::coerce_value;
pub use options::{FieldOption, FieldOptions, OptionChangeSet, OptionRule};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::name::{is_reserved_field_name, validate_field_name};
use crate::domain::Domain;
use crate::engine::{ColumnSpec, Command, EngineError, TableSpec};
use crate::error::{GatewayError, Result};
use crate::metrics;

/// Full description of a field, kept after deletion so it can be re-created
/// with its audit history.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub multiple_values: bool,
    pub options: FieldOptions,
    pub default_search_field: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub update_version: u64,
}

impl FieldDefinition {
    /// Configuration API shape.
    pub fn to_api_json(&self, state: &str) -> Value {
        let mut options = json!({
            "IndexFieldName": self.name,
            "IndexFieldType": self.field_type.as_str(),
        });
        if let (Some(target), Value::Object(type_options)) = (options.as_object_mut(), self.options.to_api_json()) {
            target.extend(type_options);
        }
        json!({
            "Options": options,
            "Status": {
                "CreationDate": self.created_at.to_rfc3339(),
                "UpdateDate": self.updated_at.to_rfc3339(),
                "UpdateVersion": self.update_version,
                "State": state,
            }
        })
    }
}

fn millis_to_datetime(value: Option<Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.as_i64())
        .and_then(DateTime::from_timestamp_millis)
}

/// Handle onto one field of a domain.
pub struct IndexField<'d> {
    domain: &'d Domain,
    name: String,
    field_type: FieldType,
    multiple_values: bool,
    pending: OptionChangeSet,
}

impl<'d> IndexField<'d> {
    pub(crate) fn new(domain: &'d Domain, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            domain,
            name: name.into(),
            field_type,
            multiple_values: false,
            pending: OptionChangeSet::default(),
        }
    }

    #[must_use]
    pub fn with_multiple_values(mut self, multiple_values: bool) -> Self {
        self.multiple_values = multiple_values;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn multiple_values(&self) -> bool {
        self.multiple_values
    }

    pub fn domain(&self) -> &'d Domain {
        self.domain
    }

    fn key(&self, suffix: &str) -> String {
        format!("column_{}_{}", self.name, suffix)
    }

    fn option_key(&self, option: FieldOption) -> String {
        self.key(option.snake_name())
    }

    fn stored_options_key(&self) -> String {
        self.key("stored_options")
    }

    fn lookup_table(&self) -> String {
        self.domain.lookup_table_name(&self.name)
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.domain.column(&self.name).await?.is_some())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Create the field's column, index and lookup table.
    pub async fn create(&self) -> Result<()> {
        validate_field_name(&self.name)?;
        if is_reserved_field_name(&self.name) {
            return Err(GatewayError::FieldOptionConflict(format!(
                "Error defining field: {}. The name '{}' is reserved",
                self.name, self.name
            )));
        }
        if !self.domain.exists().await? {
            return Err(GatewayError::NotFound(format!("Domain not found: {}", self.domain.name())));
        }

        let result = self.create_engine_objects().await;
        metrics::record_field_operation("create", if result.is_ok() { "success" } else { "error" });
        result?;

        let now = Utc::now();
        let (created_at, update_version) = match self.domain.take_snapshot(&self.name) {
            Some(previous) => (previous.created_at, previous.update_version + 1),
            None => (now, 1),
        };
        self.write_stamps(created_at, now, update_version).await?;
        self.domain.set_requires_index_documents(true).await?;

        info!(
            domain = %self.domain.name(),
            field = %self.name,
            field_type = %self.field_type,
            multiple_values = self.multiple_values,
            "Index field created"
        );
        Ok(())
    }

    async fn create_engine_objects(&self) -> std::result::Result<(), EngineError> {
        let engine = self.domain.engine();
        let table = self.domain.table_name();
        let index_name = self.domain.index_column_name(&self.name);
        let lookup = self.lookup_table();

        if let Some(key_type) = self.field_type.lookup_key_type() {
            engine
                .execute(Command::TableCreate(TableSpec::patricia(&lookup, key_type)))
                .await?;
        }

        let column_type = self.field_type.column_type(&lookup);
        let column = if self.multiple_values {
            ColumnSpec::vector(table, &self.name, column_type)
        } else {
            ColumnSpec::scalar(table, &self.name, column_type)
        };
        engine.execute(Command::ColumnCreate(column)).await?;

        let index = match self.field_type {
            FieldType::Text => {
                ColumnSpec::index(self.domain.terms_table_name(), index_name, table, &self.name).with_position()
            }
            FieldType::UInt | FieldType::Literal => ColumnSpec::index(&lookup, index_name, table, &self.name),
        };
        engine.execute(Command::ColumnCreate(index)).await?;
        Ok(())
    }

    /// Remove the field, keeping its definition in the domain's snapshot cache.
    pub async fn delete(&self) -> Result<()> {
        let definition = self.definition().await?;
        self.domain.store_snapshot(definition);

        let result = self.remove_engine_objects().await;
        metrics::record_field_operation("delete", if result.is_ok() { "success" } else { "error" });
        result?;

        let config = self.domain.config();
        for option in FieldOption::ALL {
            config.delete(&self.option_key(option)).await?;
        }
        for suffix in ["stored_options", "created_at", "updated_at", "update_version"] {
            config.delete(&self.key(suffix)).await?;
        }
        self.domain.set_requires_index_documents(true).await?;

        info!(domain = %self.domain.name(), field = %self.name, "Index field deleted");
        Ok(())
    }

    async fn remove_engine_objects(&self) -> std::result::Result<(), EngineError> {
        let engine = self.domain.engine();
        if self.field_type == FieldType::Text {
            engine
                .execute(Command::ColumnRemove {
                    table: self.domain.terms_table_name(),
                    name: self.domain.index_column_name(&self.name),
                })
                .await?;
        }
        engine
            .execute(Command::ColumnRemove {
                table: self.domain.table_name().to_string(),
                name: self.name.clone(),
            })
            .await?;
        if self.field_type.lookup_key_type().is_some() {
            let lookup = self.lookup_table();
            if engine.table_exists(&lookup).await? {
                engine.execute(Command::TableRemove { name: lookup }).await?;
            }
        }
        Ok(())
    }

    /// Drop and recreate the reverse index column.
    pub(crate) async fn rebuild_index(&self) -> Result<()> {
        let engine = self.domain.engine();
        let index_table = match self.field_type {
            FieldType::Text => self.domain.terms_table_name(),
            FieldType::UInt | FieldType::Literal => self.lookup_table(),
        };
        let index_name = self.domain.index_column_name(&self.name);
        let existing = engine.column_list(&index_table).await?;
        if existing.iter().any(|c| c.name == index_name) {
            engine
                .execute(Command::ColumnRemove {
                    table: index_table.clone(),
                    name: index_name.clone(),
                })
                .await?;
        }
        let mut spec = ColumnSpec::index(index_table, index_name, self.domain.table_name(), &self.name);
        if self.field_type == FieldType::Text {
            spec = spec.with_position();
        }
        engine.execute(Command::ColumnCreate(spec)).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // OPTIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Stage an option value until [`save`](Self::save).
    pub fn set_option(&mut self, option: FieldOption, value: impl Into<Value>) {
        self.pending.set(option, value.into());
    }

    /// Stage removal of an option, restoring its default on save.
    pub fn unset_option(&mut self, option: FieldOption) {
        self.pending.unset(option);
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) async fn persisted_options(&self) -> Result<BTreeMap<FieldOption, Value>> {
        let config = self.domain.config();
        let stored = config.get(&self.stored_options_key()).await?;
        let mut values = BTreeMap::new();
        let names = stored
            .as_ref()
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        for name in names {
            let Some(option) = FieldOption::from_snake_name(name) else {
                continue;
            };
            if let Some(value) = config.get(&self.option_key(option)).await? {
                values.insert(option, value);
            }
        }
        Ok(values)
    }

    /// Effective options: persisted values shadowed by pending changes.
    pub async fn options(&self) -> Result<FieldOptions> {
        let merged = self.pending.merged(&self.persisted_options().await?);
        FieldOptions::from_values(&self.name, self.field_type, &merged)
    }

    pub async fn option(&self, option: FieldOption) -> Result<Value> {
        Ok(self.options().await?.get(option))
    }

    pub async fn validate_options(&self) -> Result<()> {
        self.options().await?.check_conflicts(&self.name)
    }

    /// Commit pending option changes.
    pub async fn save(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let persisted = self.persisted_options().await?;
        let merged = self.pending.merged(&persisted);
        if let Err(e) = FieldOptions::from_values(&self.name, self.field_type, &merged) {
            metrics::record_field_operation("save", "rejected");
            return Err(e);
        }

        let config = self.domain.config();
        for (option, change) in self.pending.iter() {
            match change {
                Some(value) => config.set(&self.option_key(*option), value).await?,
                None => config.delete(&self.option_key(*option)).await?,
            }
        }
        self.write_stored_options(&merged).await?;
        self.pending.clear();
        self.touch().await?;
        metrics::record_field_operation("save", "success");
        Ok(())
    }

    pub(crate) async fn write_stored_options(&self, values: &BTreeMap<FieldOption, Value>) -> Result<()> {
        let names: Vec<&str> = values.keys().map(FieldOption::snake_name).collect();
        self.domain
            .config()
            .set(&self.stored_options_key(), &json!(names))
            .await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // AUDIT STAMPS
    // ═══════════════════════════════════════════════════════════════════════

    async fn write_stamps(&self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: u64) -> Result<()> {
        let config = self.domain.config();
        config
            .set(&self.key("created_at"), &json!(created_at.timestamp_millis()))
            .await?;
        config
            .set(&self.key("updated_at"), &json!(updated_at.timestamp_millis()))
            .await?;
        config.set(&self.key("update_version"), &json!(version)).await?;
        Ok(())
    }

    /// Refresh `updated_at` and bump the update version.
    pub(crate) async fn touch(&self) -> Result<()> {
        let config = self.domain.config();
        let created_at = millis_to_datetime(config.get(&self.key("created_at")).await?).unwrap_or_else(Utc::now);
        let version = config
            .get(&self.key("update_version"))
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        self.write_stamps(created_at, Utc::now(), version + 1).await
    }

    /// Current definition as stored in the engine.
    pub async fn definition(&self) -> Result<FieldDefinition> {
        if !self.exists().await? {
            return Err(GatewayError::NotFound(format!(
                "Index field not found: {}.{}",
                self.domain.name(),
                self.name
            )));
        }
        let config = self.domain.config();
        let now = Utc::now();
        let created_at = millis_to_datetime(config.get(&self.key("created_at")).await?).unwrap_or(now);
        let updated_at = millis_to_datetime(config.get(&self.key("updated_at")).await?).unwrap_or(created_at);
        let update_version = config
            .get(&self.key("update_version"))
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(1);
        let default_search_field =
            self.domain.default_search_field_name().await?.as_deref() == Some(self.name.as_str());

        Ok(FieldDefinition {
            name: self.name.clone(),
            field_type: self.field_type,
            multiple_values: self.multiple_values,
            options: self.options().await?,
            default_search_field,
            created_at,
            updated_at,
            update_version,
        })
    }
}
