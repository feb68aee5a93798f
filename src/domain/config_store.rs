// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key/value metadata kept inside the engine.
//!
//! Each domain owns a `<domain>_configurations` table (hash keyed by
//! `ShortText`) whose `value` column holds one JSON document per key.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::engine::{quote_literal, ColumnSpec, Command, Engine, EngineError, SelectOptions, TableSpec};

pub const VALUE_COLUMN: &str = "value";

#[derive(Clone)]
pub struct ConfigStore {
    engine: Arc<dyn Engine>,
    table: String,
}

impl ConfigStore {
    pub fn new(engine: Arc<dyn Engine>, table: impl Into<String>) -> Self {
        Self {
            engine,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the backing table if it is missing.
    pub async fn ensure(&self) -> Result<(), EngineError> {
        if self.engine.table_exists(&self.table).await? {
            return Ok(());
        }
        match self
            .engine
            .execute(Command::TableCreate(TableSpec::hash(&self.table, "ShortText")))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_duplicate_object() => return Ok(()),
            Err(e) => return Err(e),
        }
        self.engine
            .execute(Command::ColumnCreate(ColumnSpec::scalar(&self.table, VALUE_COLUMN, "Text")))
            .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, EngineError> {
        if !self.engine.table_exists(&self.table).await? {
            return Ok(None);
        }
        let options = SelectOptions::all(&self.table, &[VALUE_COLUMN])
            .with_filter(format!("_key == {}", quote_literal(key)));
        let reply = self.engine.select(options).await?;
        let raw = reply
            .records
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(raw.and_then(|text| serde_json::from_str(&text).ok()))
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<(), EngineError> {
        self.ensure().await?;
        let mut record = Map::new();
        record.insert("_key".to_string(), Value::from(key));
        record.insert(VALUE_COLUMN.to_string(), Value::from(value.to_string()));
        self.engine.load(&self.table, vec![record]).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), EngineError> {
        if !self.engine.table_exists(&self.table).await? {
            return Ok(());
        }
        self.engine
            .execute(Command::Delete {
                table: self.table.clone(),
                key: key.to_string(),
            })
            .await?;
        Ok(())
    }
}
