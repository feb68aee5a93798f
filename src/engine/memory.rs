// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Process-local engine.
//!
//! Keeps tables, columns and records in memory and answers the same command
//! set as the real engine. Full-text matching is a normalized substring scan,
//! which is enough for embedded use and for tests; index columns are kept as
//! schema objects only.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::command::{
    ColumnInfo, ColumnKind, ColumnSpec, Command, Drilldown, Record, RecordSet, Reply, SelectOptions,
    SelectReply, TableInfo, TableKind, TableSpec, ID_COLUMN, KEY_COLUMN, NSUBRECS_COLUMN,
};
use super::expr::Expr;
use super::traits::{Engine, EngineError, RC_INVALID_ARGUMENT, RC_NOT_FOUND};
use crate::metrics;

const TEXT_TYPES: &[&str] = &["ShortText", "Text", "LongText"];
const INTEGER_TYPES: &[&str] = &["UInt32", "UInt64", "Int32", "Int64"];

#[derive(Debug, Clone)]
struct MemColumn {
    kind: ColumnKind,
    value_type: String,
    sources: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemRow {
    key: Value,
    values: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
struct MemTable {
    kind: TableKind,
    key_type: Option<String>,
    columns: BTreeMap<String, MemColumn>,
    rows: BTreeMap<u32, MemRow>,
    keys: HashMap<String, u32>,
    next_id: u32,
}

impl MemTable {
    fn new(spec: &TableSpec) -> Self {
        Self {
            kind: spec.kind,
            key_type: spec.key_type.clone(),
            columns: BTreeMap::new(),
            rows: BTreeMap::new(),
            keys: HashMap::new(),
            next_id: 1,
        }
    }

    /// Find or add the record for `key`, returning its id.
    fn upsert_key(&mut self, key: Value) -> u32 {
        let canonical = canonical_key(&key);
        if let Some(id) = self.keys.get(&canonical) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.keys.insert(canonical, id);
        self.rows.insert(
            id,
            MemRow {
                key,
                values: HashMap::new(),
            },
        );
        id
    }

    fn data_columns(&self) -> impl Iterator<Item = (&String, &MemColumn)> {
        self.columns.iter().filter(|(_, c)| c.kind != ColumnKind::Index)
    }
}

fn canonical_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_builtin(value_type: &str) -> bool {
    TEXT_TYPES.contains(&value_type) || INTEGER_TYPES.contains(&value_type)
}

/// Cast a scalar to a builtin type.
fn cast_builtin(value_type: &str, value: &Value) -> Result<Value, String> {
    if TEXT_TYPES.contains(&value_type) {
        return Ok(Value::String(match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }));
    }
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("invalid {} value: <{}>", value_type, s)),
        Value::Bool(b) => Ok(Value::from(u8::from(*b))),
        other => Err(format!("invalid {} value: <{}>", value_type, other)),
    }
}

fn default_value(column: &MemColumn) -> Value {
    match column.kind {
        ColumnKind::Vector => Value::Array(Vec::new()),
        _ if INTEGER_TYPES.contains(&column.value_type.as_str()) => Value::from(0),
        _ => Value::String(String::new()),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[derive(Default)]
struct Catalog {
    tables: BTreeMap<String, MemTable>,
}

impl Catalog {
    fn table(&self, command: &'static str, name: &str) -> Result<&MemTable, EngineError> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::command(command, RC_INVALID_ARGUMENT, format!("invalid table name: <{}>", name)))
    }

    fn table_mut(&mut self, command: &'static str, name: &str) -> Result<&mut MemTable, EngineError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| EngineError::command(command, RC_INVALID_ARGUMENT, format!("invalid table name: <{}>", name)))
    }

    fn table_create(&mut self, spec: TableSpec) -> Result<Reply, EngineError> {
        if self.tables.contains_key(&spec.name) {
            return Err(EngineError::command(
                "table_create",
                RC_INVALID_ARGUMENT,
                format!("already used name was assigned: <{}>", spec.name),
            ));
        }
        self.tables.insert(spec.name.clone(), MemTable::new(&spec));
        Ok(Reply::Done(true))
    }

    fn table_remove(&mut self, name: &str) -> Result<Reply, EngineError> {
        self.table("table_remove", name)?;
        let referenced_by = self.tables.iter().find_map(|(table_name, table)| {
            table
                .columns
                .iter()
                .find(|(_, c)| c.kind != ColumnKind::Index && c.value_type == name && table_name != name)
                .map(|(column_name, _)| format!("{}.{}", table_name, column_name))
        });
        if let Some(column) = referenced_by {
            return Err(EngineError::command(
                "table_remove",
                RC_INVALID_ARGUMENT,
                format!("table is referenced: <{}> by <{}>", name, column),
            ));
        }
        self.tables.remove(name);
        // Index columns over the removed table go with it.
        for table in self.tables.values_mut() {
            table
                .columns
                .retain(|_, c| !(c.kind == ColumnKind::Index && c.value_type == name));
        }
        Ok(Reply::Done(true))
    }

    fn column_create(&mut self, spec: ColumnSpec) -> Result<Reply, EngineError> {
        let value_type_known = is_builtin(&spec.value_type) || self.tables.contains_key(&spec.value_type);
        if !value_type_known {
            return Err(EngineError::command(
                "column_create",
                RC_INVALID_ARGUMENT,
                format!("unknown type: <{}>", spec.value_type),
            ));
        }
        if let Some(ref source) = spec.source {
            let indexed = self.table("column_create", &spec.value_type)?;
            if !indexed.columns.contains_key(source) && source != KEY_COLUMN {
                return Err(EngineError::command(
                    "column_create",
                    RC_INVALID_ARGUMENT,
                    format!("unknown source column: <{}.{}>", spec.value_type, source),
                ));
            }
        }
        let table = self.table_mut("column_create", &spec.table)?;
        if table.columns.contains_key(&spec.name) {
            return Err(EngineError::command(
                "column_create",
                RC_INVALID_ARGUMENT,
                format!("already used name was assigned: <{}.{}>", spec.table, spec.name),
            ));
        }
        table.columns.insert(
            spec.name.clone(),
            MemColumn {
                kind: spec.kind,
                value_type: spec.value_type.clone(),
                sources: spec.source.iter().cloned().collect(),
            },
        );
        Ok(Reply::Done(true))
    }

    fn column_remove(&mut self, table_name: &str, name: &str) -> Result<Reply, EngineError> {
        let table = self.table_mut("column_remove", table_name)?;
        if table.columns.remove(name).is_none() {
            return Err(EngineError::command(
                "column_remove",
                RC_INVALID_ARGUMENT,
                format!("invalid column name: <{}.{}>", table_name, name),
            ));
        }
        for row in table.rows.values_mut() {
            row.values.remove(name);
        }
        Ok(Reply::Done(true))
    }

    fn column_list(&self, table_name: &str) -> Result<Reply, EngineError> {
        let table = self.table("column_list", table_name)?;
        let columns = table
            .columns
            .iter()
            .map(|(name, column)| ColumnInfo {
                name: name.clone(),
                kind: column.kind,
                value_type: column.value_type.clone(),
                sources: column.sources.clone(),
            })
            .collect();
        Ok(Reply::Columns(columns))
    }

    fn cast_key(&self, table: &MemTable, key: &Value) -> Result<Value, String> {
        match table.key_type.as_deref() {
            Some(key_type) if is_builtin(key_type) => cast_builtin(key_type, key),
            Some(referenced) => {
                let target = self
                    .tables
                    .get(referenced)
                    .ok_or_else(|| format!("invalid key type: <{}>", referenced))?;
                self.cast_key(target, key)
            }
            None => Err("table has no key".to_string()),
        }
    }

    /// Cast one loaded value, collecting keys to add to referenced tables.
    fn cast_column_value(
        &self,
        column: &MemColumn,
        value: &Value,
        references: &mut Vec<(String, Value)>,
    ) -> Result<Value, String> {
        let cast_one = |item: &Value, references: &mut Vec<(String, Value)>| -> Result<Value, String> {
            if is_builtin(&column.value_type) {
                return cast_builtin(&column.value_type, item);
            }
            let target = self
                .tables
                .get(&column.value_type)
                .ok_or_else(|| format!("invalid reference table: <{}>", column.value_type))?;
            let key = self.cast_key(target, item)?;
            if key != Value::String(String::new()) {
                references.push((column.value_type.clone(), key.clone()));
            }
            Ok(key)
        };

        match (column.kind, value) {
            (ColumnKind::Vector, Value::Array(items)) => items
                .iter()
                .map(|item| cast_one(item, references))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (ColumnKind::Vector, Value::Null) => Ok(Value::Array(Vec::new())),
            (ColumnKind::Vector, scalar) => Ok(Value::Array(vec![cast_one(scalar, references)?])),
            (_, Value::Array(_)) => Err("vector value for scalar column".to_string()),
            (_, scalar) => cast_one(scalar, references),
        }
    }

    fn load(&mut self, table_name: &str, values: Vec<Record>) -> Result<Reply, EngineError> {
        let fail = |message: String| EngineError::command("load", RC_INVALID_ARGUMENT, message);
        let mut prepared = Vec::with_capacity(values.len());
        let mut references = Vec::new();
        {
            let table = self.table("load", table_name)?;
            for record in &values {
                let key = match (table.kind, record.get(KEY_COLUMN)) {
                    (TableKind::Array, _) => Value::Null,
                    (_, Some(key)) => self.cast_key(table, key).map_err(fail)?,
                    (_, None) => return Err(fail("neither _key nor _id is assigned".to_string())),
                };
                let mut cells = HashMap::new();
                for (name, value) in record {
                    if name == KEY_COLUMN {
                        continue;
                    }
                    let column = table
                        .columns
                        .get(name)
                        .filter(|c| c.kind != ColumnKind::Index)
                        .ok_or_else(|| fail(format!("nonexistent column: <{}>", name)))?;
                    let cast = self
                        .cast_column_value(column, value, &mut references)
                        .map_err(fail)?;
                    cells.insert(name.clone(), cast);
                }
                prepared.push((key, cells));
            }
        }

        for (referenced, key) in references {
            if let Some(target) = self.tables.get_mut(&referenced) {
                target.upsert_key(key);
            }
        }

        let table = self.table_mut("load", table_name)?;
        let count = prepared.len() as u64;
        for (key, cells) in prepared {
            let id = table.upsert_key(key);
            if let Some(row) = table.rows.get_mut(&id) {
                row.values.extend(cells);
            }
        }
        Ok(Reply::Count(count))
    }

    fn delete(&mut self, table_name: &str, key: &str) -> Result<Reply, EngineError> {
        let table = self.table_mut("delete", table_name)?;
        match table.keys.remove(key) {
            Some(id) => {
                table.rows.remove(&id);
                Ok(Reply::Done(true))
            }
            None => Ok(Reply::Done(false)),
        }
    }

    fn cell(table: &MemTable, id: u32, row: &MemRow, column: &str) -> Option<Value> {
        match column {
            KEY_COLUMN => Some(row.key.clone()),
            ID_COLUMN => Some(Value::from(id)),
            name => {
                let definition = table.columns.get(name)?;
                Some(row.values.get(name).cloned().unwrap_or_else(|| default_value(definition)))
            }
        }
    }

    fn expansion(&self, source: Option<&str>, term: &str) -> Vec<String> {
        let mut terms = vec![term.to_string()];
        let Some((table_name, column)) = source.and_then(|s| s.split_once('.')) else {
            return terms;
        };
        let Some(table) = self.tables.get(table_name) else {
            return terms;
        };
        if let Some(row) = table.keys.get(term).and_then(|id| table.rows.get(id)) {
            if let Some(Value::Array(synonyms)) = row.values.get(column) {
                terms.extend(synonyms.iter().filter_map(|s| s.as_str().map(String::from)));
            }
        }
        terms
    }

    fn select(&self, options: &SelectOptions) -> Result<Reply, EngineError> {
        let table = self.table("select", &options.table)?;
        let filter = options
            .filter
            .as_deref()
            .map(Expr::parse)
            .transpose()
            .map_err(|message| EngineError::command("select", RC_INVALID_ARGUMENT, format!("syntax error: {}", message)))?;

        for column in &options.output_columns {
            if column != KEY_COLUMN && column != ID_COLUMN && !table.columns.contains_key(column) {
                return Err(EngineError::command(
                    "select",
                    RC_INVALID_ARGUMENT,
                    format!("invalid output column: <{}>", column),
                ));
            }
        }

        let expand = |term: &str| self.expansion(options.query_expansion.as_deref(), term);
        let mut matched: Vec<(u32, &MemRow)> = table
            .rows
            .iter()
            .filter(|(id, row)| match filter {
                None => true,
                Some(ref expr) => {
                    let lookup = |column: &str| Self::cell(table, **id, row, column);
                    expr.matches(&lookup, &expand)
                }
            })
            .map(|(id, row)| (*id, row))
            .collect();

        if let Some(ref sortby) = options.sortby {
            let keys: Vec<(bool, &str)> = sortby
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| match k.strip_prefix('-') {
                    Some(name) => (true, name),
                    None => (false, k),
                })
                .collect();
            matched.sort_by(|(a_id, a), (b_id, b)| {
                for (descending, column) in &keys {
                    let left = Self::cell(table, *a_id, a, column).unwrap_or(Value::Null);
                    let right = Self::cell(table, *b_id, b, column).unwrap_or(Value::Null);
                    let ordering = compare_values(&left, &right);
                    let ordering = if *descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a_id.cmp(b_id)
            });
        }

        let found = matched.len() as u64;
        let mut records = RecordSet::new(options.output_columns.clone());
        let page = matched.iter().skip(options.offset);
        let page: Box<dyn Iterator<Item = &(u32, &MemRow)>> = if options.limit < 0 {
            Box::new(page)
        } else {
            Box::new(page.take(options.limit as usize))
        };
        for (id, row) in page {
            records.rows.push(
                options
                    .output_columns
                    .iter()
                    .map(|column| Self::cell(table, *id, row, column).unwrap_or(Value::Null))
                    .collect(),
            );
        }

        let mut drilldowns = Vec::new();
        for column in &options.drilldown {
            if !table.columns.contains_key(column) {
                return Err(EngineError::command(
                    "select",
                    RC_INVALID_ARGUMENT,
                    format!("invalid drilldown column: <{}>", column),
                ));
            }
            drilldowns.push(Self::drilldown(table, &matched, column, options));
        }

        Ok(Reply::Select(SelectReply {
            found,
            records,
            drilldowns,
        }))
    }

    fn drilldown(table: &MemTable, matched: &[(u32, &MemRow)], column: &str, options: &SelectOptions) -> Drilldown {
        let mut groups: Vec<(Value, u64)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (id, row) in matched {
            let values = match Self::cell(table, *id, row, column) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(Value::String(s)) if s.is_empty() => Vec::new(),
                Some(other) => vec![other],
            };
            for value in values {
                let canonical = canonical_key(&value);
                match positions.get(&canonical) {
                    Some(&pos) => groups[pos].1 += 1,
                    None => {
                        positions.insert(canonical, groups.len());
                        groups.push((value, 1));
                    }
                }
            }
        }

        match options.drilldown_sortby.as_deref() {
            Some("-_nsubrecs") => groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| compare_values(&a.0, &b.0))),
            Some("_nsubrecs") => groups.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| compare_values(&a.0, &b.0))),
            Some("_key") => groups.sort_by(|a, b| compare_values(&a.0, &b.0)),
            _ => {}
        }

        let columns = if options.drilldown_output_columns.is_empty() {
            vec![KEY_COLUMN.to_string(), NSUBRECS_COLUMN.to_string()]
        } else {
            options.drilldown_output_columns.clone()
        };
        let mut records = RecordSet::new(columns.clone());
        for (value, count) in &groups {
            records.rows.push(
                columns
                    .iter()
                    .map(|c| match c.as_str() {
                        NSUBRECS_COLUMN => Value::from(*count),
                        KEY_COLUMN => value.clone(),
                        _ => Value::Null,
                    })
                    .collect(),
            );
        }

        Drilldown {
            column: column.to_string(),
            found: groups.len() as u64,
            records,
        }
    }

    fn dump(&self, tables: &[String]) -> Result<Reply, EngineError> {
        let names: Vec<&String> = if tables.is_empty() {
            self.tables.keys().collect()
        } else {
            tables.iter().collect()
        };

        let mut blocks = Vec::new();
        for name in names {
            let table = self.table("dump", name)?;
            if table.rows.is_empty() {
                continue;
            }
            let columns: Vec<&String> = table.data_columns().map(|(name, _)| name).collect();
            let mut header = Vec::new();
            if table.kind != TableKind::Array {
                header.push(Value::from(KEY_COLUMN));
            }
            header.extend(columns.iter().map(|c| Value::from(c.as_str())));

            let mut lines = vec![Value::Array(header).to_string()];
            for (id, row) in &table.rows {
                let mut cells = Vec::new();
                if table.kind != TableKind::Array {
                    cells.push(row.key.clone());
                }
                for column in &columns {
                    cells.push(Self::cell(table, *id, row, column).unwrap_or(Value::Null));
                }
                lines.push(Value::Array(cells).to_string());
            }
            blocks.push(format!("load --table {}\n[\n{}\n]", name, lines.join(",\n")));
        }
        Ok(Reply::Dump(blocks.join("\n\n")))
    }

    fn table_list(&self) -> Reply {
        Reply::Tables(
            self.tables
                .iter()
                .map(|(name, table)| TableInfo {
                    name: name.clone(),
                    kind: table.kind,
                    key_type: table.key_type.clone(),
                })
                .collect(),
        )
    }

    fn query(&self, command: Command) -> Result<Reply, EngineError> {
        match command {
            Command::TableList => Ok(self.table_list()),
            Command::ColumnList { table } => self.column_list(&table),
            Command::Select(options) => self.select(&options),
            Command::Dump { tables } => self.dump(&tables),
            other => Err(EngineError::command(other.name(), RC_NOT_FOUND, "not a read-only command")),
        }
    }

    fn execute(&mut self, command: Command) -> Result<Reply, EngineError> {
        match command {
            Command::TableCreate(spec) => self.table_create(spec),
            Command::TableRemove { name } => self.table_remove(&name),
            Command::ColumnCreate(spec) => self.column_create(spec),
            Command::ColumnRemove { table, name } => self.column_remove(&table, &name),
            Command::Load { table, values } => self.load(&table, values),
            Command::Delete { table, key } => self.delete(&table, &key),
            read_only => self.query(read_only),
        }
    }
}

/// In-memory [`Engine`] implementation.
#[derive(Default)]
pub struct InMemoryEngine {
    catalog: RwLock<Catalog>,
}

impl InMemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables currently defined.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.catalog.read().tables.len()
    }

    /// Number of records in a table, or `None` if it does not exist.
    #[must_use]
    pub fn record_count(&self, table: &str) -> Option<usize> {
        self.catalog.read().tables.get(table).map(|t| t.rows.len())
    }
}

#[async_trait]
impl Engine for InMemoryEngine {
    async fn execute(&self, command: Command) -> Result<Reply, EngineError> {
        let name = command.name();
        let _timer = metrics::LatencyTimer::new("memory", name);
        debug!(command = %command, "Executing engine command");

        let result = if command.is_read_only() {
            self.catalog.read().query(command)
        } else {
            self.catalog.write().execute(command)
        };

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_engine_command("memory", name, status);
        result
    }
}
