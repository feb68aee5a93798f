// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search domains.
//!
//! A domain maps 1:1 onto an engine table of the same name. Everything else
//! the domain needs lives in tables prefixed with `<name>_`, which can never
//! collide with another domain because domain names cannot contain `_`:
//!
//! ```text
//! companies                   documents (_key = document id)
//! companies_BigramTerms       bigram terms, holds text field indexes
//! companies_configurations    field options and domain settings
//! companies_synonyms          synonym expansion (optional)
//! companies_index_<field>     lookup table per uint/literal field
//! ```

pub mod config_store;
pub mod name;
pub mod registry;

pub use config_store::ConfigStore;
pub use registry::{DomainRegistry, RequestContext};

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::engine::{
    ColumnInfo, ColumnKind, ColumnSpec, Command, Engine, SelectOptions, TableSpec,
};
use crate::error::{GatewayError, Result};
use crate::field::{FieldDefinition, FieldOptions, FieldType, IndexField};
use crate::metrics;

pub const TERMS_TABLE_SUFFIX: &str = "_BigramTerms";
pub const SYNONYMS_TABLE_SUFFIX: &str = "_synonyms";
pub const CONFIGURATIONS_TABLE_SUFFIX: &str = "_configurations";
/// Lookup tables get their own namespace so no field name can reach another
/// auxiliary table.
pub const LOOKUP_TABLE_INFIX: &str = "_index_";
pub const SYNONYMS_COLUMN: &str = "synonyms";

const DEFAULT_SEARCH_FIELD_KEY: &str = "default_search_field";
const REQUIRES_INDEX_DOCUMENTS_KEY: &str = "requires_index_documents";

/// Field as seen by the search compiler and the batch pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub multiple_values: bool,
    pub options: FieldOptions,
}

/// Point-in-time view of a domain's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainSchema {
    pub domain: String,
    pub fields: BTreeMap<String, FieldSchema>,
    /// Resolved default search field; `None` if unset or dangling.
    pub default_search_field: Option<String>,
    pub has_synonyms: bool,
}

impl DomainSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Fields searched by a plain `q`: the default search field, else every
    /// text field.
    pub fn default_fields(&self) -> Vec<String> {
        match self.default_search_field {
            Some(ref name) if self.fields.contains_key(name) => vec![name.clone()],
            _ => self
                .fields
                .values()
                .filter(|f| f.field_type == FieldType::Text)
                .map(|f| f.name.clone())
                .collect(),
        }
    }
}

pub struct Domain {
    name: String,
    id: String,
    engine: Arc<dyn Engine>,
    config: ConfigStore,
    /// Definitions of deleted fields, kept for re-creation.
    snapshots: DashMap<String, FieldDefinition>,
}

impl Domain {
    /// Handle for `name`. Does not touch the engine.
    pub fn new(name: impl Into<String>, engine: Arc<dyn Engine>) -> Self {
        let name = name.into();
        let config = ConfigStore::new(engine.clone(), format!("{}{}", name, CONFIGURATIONS_TABLE_SUFFIX));
        Self {
            id: name::domain_id(&name),
            name,
            engine,
            config,
            snapshots: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn table_name(&self) -> &str {
        &self.name
    }

    pub fn terms_table_name(&self) -> String {
        format!("{}{}", self.name, TERMS_TABLE_SUFFIX)
    }

    pub fn synonyms_table_name(&self) -> String {
        format!("{}{}", self.name, SYNONYMS_TABLE_SUFFIX)
    }

    pub fn configurations_table_name(&self) -> &str {
        self.config.table()
    }

    pub fn lookup_table_name(&self, field: &str) -> String {
        format!("{}{}{}", self.name, LOOKUP_TABLE_INFIX, field)
    }

    pub fn index_column_name(&self, field: &str) -> String {
        format!("{}_{}", self.name, field)
    }

    pub fn doc_endpoint(&self, config: &GatewayConfig) -> String {
        config.endpoint("doc", &self.name, &self.id)
    }

    pub fn search_endpoint(&self, config: &GatewayConfig) -> String {
        config.endpoint("search", &self.name, &self.id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.engine.table_exists(&self.name).await?)
    }

    /// Create the domain tables. Creating an existing domain is a no-op.
    pub async fn create(&self) -> Result<()> {
        name::validate_domain_name(&self.name)?;
        if self.exists().await? {
            debug!(domain = %self.name, "Domain already exists");
            return Ok(());
        }

        match self
            .engine
            .execute(Command::TableCreate(TableSpec::hash(&self.name, "ShortText")))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_duplicate_object() => {
                metrics::record_domain_operation("create", "conflict");
                return Err(GatewayError::DomainExists(self.name.clone()));
            }
            Err(e) => {
                metrics::record_domain_operation("create", "error");
                return Err(e.into());
            }
        }

        let terms = TableSpec::patricia(self.terms_table_name(), "ShortText").with_tokenizer("TokenBigram");
        match self.engine.execute(Command::TableCreate(terms)).await {
            Err(e) if !e.is_duplicate_object() => return Err(e.into()),
            _ => {}
        }
        self.config.ensure().await?;

        metrics::record_domain_operation("create", "success");
        info!(domain = %self.name, id = %self.id, "Domain created");
        Ok(())
    }

    /// Remove the domain table and every auxiliary table.
    pub async fn delete(&self) -> Result<()> {
        if !self.exists().await? {
            debug!(domain = %self.name, "Domain already absent");
            return Ok(());
        }

        // The main table goes first; it references the lookup tables.
        self.engine
            .execute(Command::TableRemove { name: self.name.clone() })
            .await?;

        let prefix = format!("{}_", self.name);
        let mut auxiliary: Vec<String> = self
            .engine
            .table_list()
            .await?
            .into_iter()
            .map(|t| t.name)
            .filter(|name| name.starts_with(&prefix))
            .collect();
        // Lookup tables before the terms table so no index outlives its source.
        auxiliary.sort_by_key(|name| name.ends_with(TERMS_TABLE_SUFFIX));
        for table in auxiliary {
            self.engine.execute(Command::TableRemove { name: table }).await?;
        }
        self.snapshots.clear();

        metrics::record_domain_operation("delete", "success");
        info!(domain = %self.name, "Domain deleted");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FIELDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Handle for a field that may not exist yet.
    pub fn index_field(&self, name: &str, field_type: FieldType) -> IndexField<'_> {
        IndexField::new(self, name, field_type)
    }

    pub(crate) async fn column(&self, name: &str) -> Result<Option<ColumnInfo>> {
        if !self.exists().await? {
            return Ok(None);
        }
        Ok(self
            .engine
            .column_list(&self.name)
            .await?
            .into_iter()
            .find(|c| c.name == name && c.kind != ColumnKind::Index))
    }

    /// Handle for an existing field, typed from its column.
    pub async fn get_index_field(&self, name: &str) -> Result<IndexField<'_>> {
        let column = self
            .column(name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Index field not found: {}.{}", self.name, name)))?;
        let (field_type, multiple_values) = FieldType::detect(&column);
        Ok(IndexField::new(self, name, field_type).with_multiple_values(multiple_values))
    }

    /// Every field of the domain, sorted by name.
    pub async fn index_fields(&self) -> Result<Vec<IndexField<'_>>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let mut columns: Vec<ColumnInfo> = self
            .engine
            .column_list(&self.name)
            .await?
            .into_iter()
            .filter(|c| c.kind != ColumnKind::Index && !c.name.starts_with('_'))
            .collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(columns
            .iter()
            .map(|column| {
                let (field_type, multiple_values) = FieldType::detect(column);
                IndexField::new(self, column.name.clone(), field_type).with_multiple_values(multiple_values)
            })
            .collect())
    }

    pub(crate) fn store_snapshot(&self, definition: FieldDefinition) {
        self.snapshots.insert(definition.name.clone(), definition);
    }

    pub(crate) fn take_snapshot(&self, name: &str) -> Option<FieldDefinition> {
        self.snapshots.remove(name).map(|(_, definition)| definition)
    }

    /// Definition of a field as it was when last deleted.
    pub fn field_snapshot(&self, name: &str) -> Option<FieldDefinition> {
        self.snapshots.get(name).map(|d| d.clone())
    }

    /// Snapshot of every field and setting the search side needs.
    pub async fn schema(&self) -> Result<DomainSchema> {
        let mut fields = BTreeMap::new();
        for field in self.index_fields().await? {
            fields.insert(
                field.name().to_string(),
                FieldSchema {
                    name: field.name().to_string(),
                    field_type: field.field_type(),
                    multiple_values: field.multiple_values(),
                    options: field.options().await?,
                },
            );
        }
        let default_search_field = self
            .default_search_field_name()
            .await?
            .filter(|name| fields.contains_key(name));
        Ok(DomainSchema {
            domain: self.name.clone(),
            fields,
            default_search_field,
            has_synonyms: self.has_synonyms().await?,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETTINGS
    // ═══════════════════════════════════════════════════════════════════════

    /// Stored default search field name, whether or not the field exists.
    pub(crate) async fn default_search_field_name(&self) -> Result<Option<String>> {
        Ok(self
            .config
            .get(DEFAULT_SEARCH_FIELD_KEY)
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .filter(|name| !name.is_empty()))
    }

    /// Default search field, resolved by name against the current fields.
    pub async fn default_search_field(&self) -> Result<Option<IndexField<'_>>> {
        match self.default_search_field_name().await? {
            Some(name) => match self.get_index_field(&name).await {
                Ok(field) => Ok(Some(field)),
                Err(GatewayError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// Set or clear (`None` or empty) the default search field.
    pub async fn set_default_search_field(&self, name: Option<&str>) -> Result<()> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                self.get_index_field(name).await?;
                self.config.set(DEFAULT_SEARCH_FIELD_KEY, &json!(name)).await?;
            }
            None => self.config.delete(DEFAULT_SEARCH_FIELD_KEY).await?,
        }
        info!(domain = %self.name, field = ?name, "Default search field updated");
        Ok(())
    }

    pub async fn requires_index_documents(&self) -> Result<bool> {
        Ok(self
            .config
            .get(REQUIRES_INDEX_DOCUMENTS_KEY)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub(crate) async fn set_requires_index_documents(&self, required: bool) -> Result<()> {
        self.config
            .set(REQUIRES_INDEX_DOCUMENTS_KEY, &Value::Bool(required))
            .await?;
        Ok(())
    }

    pub async fn searchable_documents_count(&self) -> Result<u64> {
        if !self.exists().await? {
            return Ok(0);
        }
        let mut options = SelectOptions::new(&self.name);
        options.limit = 0;
        Ok(self.engine.select(options).await?.found)
    }

    /// Rebuild every field index. Returns the names of the indexed fields.
    pub async fn index_documents(&self) -> Result<Vec<String>> {
        let fields = self.index_fields().await?;
        let mut names = Vec::with_capacity(fields.len());
        for field in &fields {
            field.rebuild_index().await?;
            names.push(field.name().to_string());
        }
        self.set_requires_index_documents(false).await?;
        info!(domain = %self.name, fields = names.len(), "Documents indexed");
        Ok(names)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SYNONYMS
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn has_synonyms(&self) -> Result<bool> {
        Ok(self.engine.table_exists(&self.synonyms_table_name()).await?)
    }

    /// Replace the synonym dictionary. An empty map removes the table.
    pub async fn update_synonyms(&self, synonyms: &BTreeMap<String, Vec<String>>) -> Result<()> {
        let table = self.synonyms_table_name();
        if self.has_synonyms().await? {
            self.engine
                .execute(Command::TableRemove { name: table.clone() })
                .await?;
        }
        if synonyms.is_empty() {
            return Ok(());
        }

        self.engine
            .execute(Command::TableCreate(TableSpec::hash(&table, "ShortText")))
            .await?;
        self.engine
            .execute(Command::ColumnCreate(ColumnSpec::vector(&table, SYNONYMS_COLUMN, "ShortText")))
            .await?;
        let records = synonyms
            .iter()
            .map(|(term, expansions)| {
                let mut record = Map::new();
                record.insert("_key".to_string(), json!(term));
                // The term itself comes first so expansion keeps the original.
                let mut values = vec![term.clone()];
                values.extend(expansions.iter().filter(|e| *e != term).cloned());
                record.insert(SYNONYMS_COLUMN.to_string(), json!(values));
                record
            })
            .collect();
        self.engine.load(&table, records).await?;
        info!(domain = %self.name, terms = synonyms.len(), "Synonyms updated");
        Ok(())
    }

    pub async fn synonyms(&self) -> Result<BTreeMap<String, Vec<String>>> {
        if !self.has_synonyms().await? {
            return Ok(BTreeMap::new());
        }
        let reply = self
            .engine
            .select(SelectOptions::all(self.synonyms_table_name(), &["_key", SYNONYMS_COLUMN]))
            .await?;
        let mut synonyms = BTreeMap::new();
        for row in reply.records.rows {
            let Some(term) = row.first().and_then(Value::as_str).map(String::from) else {
                continue;
            };
            let expansions = row
                .get(1)
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|v| *v != term)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            synonyms.insert(term, expansions);
        }
        Ok(synonyms)
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}
