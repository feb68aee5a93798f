// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine command protocol.
//!
//! Every interaction with the backing engine is one of the [`Command`]
//! variants below. Commands render to the engine's flat parameter form
//! (`table_create --name Foo --flags TABLE_HASH_KEY --key_type ShortText`)
//! so the same value can be executed in-process or sent over HTTP.
//!
//! ```text
//! table_create   column_create   load     select
//! table_remove   column_remove   delete   dump
//! table_list     column_list
//! ```

use serde_json::{Map, Value};

use super::traits::EngineError;

/// One record as loaded into or read from a table.
pub type Record = Map<String, Value>;

/// Pseudo column holding a record's primary key.
pub const KEY_COLUMN: &str = "_key";

/// Pseudo column holding a record's internal id (always >= 1).
pub const ID_COLUMN: &str = "_id";

/// Pseudo column holding the group size in drilldown results.
pub const NSUBRECS_COLUMN: &str = "_nsubrecs";

/// Quote a string as an engine script literal.
///
/// ```
/// use cloudsearch_gateway::engine::command::quote_literal;
/// assert_eq!(quote_literal("a\"b"), "\"a\\\"b\"");
/// ```
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Table key structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// `TABLE_HASH_KEY`
    Hash,
    /// `TABLE_PAT_KEY` (patricia trie, supports prefix lookups)
    Patricia,
    /// `TABLE_NO_KEY`
    Array,
}

impl TableKind {
    pub fn flag(&self) -> &'static str {
        match self {
            TableKind::Hash => "TABLE_HASH_KEY",
            TableKind::Patricia => "TABLE_PAT_KEY",
            TableKind::Array => "TABLE_NO_KEY",
        }
    }

    /// Parse from an engine flags string such as `TABLE_PAT_KEY|PERSISTENT`.
    pub fn from_flags(flags: &str) -> Self {
        if flags.contains("TABLE_PAT_KEY") {
            TableKind::Patricia
        } else if flags.contains("TABLE_NO_KEY") {
            TableKind::Array
        } else {
            TableKind::Hash
        }
    }
}

/// `table_create` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub kind: TableKind,
    pub key_type: Option<String>,
    pub default_tokenizer: Option<String>,
    pub normalize: bool,
}

impl TableSpec {
    pub fn hash(name: impl Into<String>, key_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Hash,
            key_type: Some(key_type.into()),
            default_tokenizer: None,
            normalize: false,
        }
    }

    pub fn patricia(name: impl Into<String>, key_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Patricia,
            key_type: Some(key_type.into()),
            default_tokenizer: None,
            normalize: false,
        }
    }

    /// Tokenize keys with the given tokenizer and normalize them.
    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Self {
        self.default_tokenizer = Some(tokenizer.into());
        self.normalize = true;
        self
    }

    pub fn flags(&self) -> String {
        if self.normalize {
            format!("{}|KEY_NORMALIZE", self.kind.flag())
        } else {
            self.kind.flag().to_string()
        }
    }
}

/// Column storage shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar,
    Vector,
    Index,
}

impl ColumnKind {
    pub fn from_flags(flags: &str) -> Self {
        if flags.contains("COLUMN_INDEX") {
            ColumnKind::Index
        } else if flags.contains("COLUMN_VECTOR") {
            ColumnKind::Vector
        } else {
            ColumnKind::Scalar
        }
    }
}

/// `column_create` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub table: String,
    pub name: String,
    pub kind: ColumnKind,
    /// Builtin type name (`ShortText`, `UInt32`, ...) or a table name.
    pub value_type: String,
    /// Indexed column, for index columns.
    pub source: Option<String>,
    pub with_position: bool,
}

impl ColumnSpec {
    pub fn scalar(table: impl Into<String>, name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            kind: ColumnKind::Scalar,
            value_type: value_type.into(),
            source: None,
            with_position: false,
        }
    }

    pub fn vector(table: impl Into<String>, name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Vector,
            ..Self::scalar(table, name, value_type)
        }
    }

    /// Reverse index over `source` in table `indexed_table`.
    pub fn index(
        table: impl Into<String>,
        name: impl Into<String>,
        indexed_table: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            kind: ColumnKind::Index,
            value_type: indexed_table.into(),
            source: Some(source.into()),
            with_position: false,
        }
    }

    pub fn with_position(mut self) -> Self {
        self.with_position = true;
        self
    }

    pub fn flags(&self) -> String {
        match self.kind {
            ColumnKind::Scalar => "COLUMN_SCALAR".to_string(),
            ColumnKind::Vector => "COLUMN_VECTOR".to_string(),
            ColumnKind::Index if self.with_position => "COLUMN_INDEX|WITH_POSITION".to_string(),
            ColumnKind::Index => "COLUMN_INDEX".to_string(),
        }
    }
}

/// `select` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    pub table: String,
    pub filter: Option<String>,
    pub output_columns: Vec<String>,
    pub sortby: Option<String>,
    pub offset: usize,
    /// Negative means "all records".
    pub limit: i64,
    pub drilldown: Vec<String>,
    pub drilldown_sortby: Option<String>,
    pub drilldown_output_columns: Vec<String>,
    pub query_expansion: Option<String>,
}

impl SelectOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            output_columns: vec![ID_COLUMN.to_string(), KEY_COLUMN.to_string()],
            sortby: None,
            offset: 0,
            limit: 10,
            drilldown: Vec::new(),
            drilldown_sortby: None,
            drilldown_output_columns: Vec::new(),
            query_expansion: None,
        }
    }

    /// Select every record of `table` with the given output columns.
    pub fn all(table: impl Into<String>, output_columns: &[&str]) -> Self {
        Self {
            output_columns: output_columns.iter().map(|c| c.to_string()).collect(),
            limit: -1,
            ..Self::new(table)
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("table", self.table.clone())];
        if let Some(ref filter) = self.filter {
            params.push(("filter", filter.clone()));
        }
        if !self.output_columns.is_empty() {
            params.push(("output_columns", self.output_columns.join(",")));
        }
        if let Some(ref sortby) = self.sortby {
            params.push(("sortby", sortby.clone()));
        }
        params.push(("offset", self.offset.to_string()));
        params.push(("limit", self.limit.to_string()));
        if !self.drilldown.is_empty() {
            params.push(("drilldown", self.drilldown.join(",")));
            if let Some(ref sortby) = self.drilldown_sortby {
                params.push(("drilldown_sortby", sortby.clone()));
            }
            if !self.drilldown_output_columns.is_empty() {
                params.push(("drilldown_output_columns", self.drilldown_output_columns.join(",")));
            }
        }
        if let Some(ref expansion) = self.query_expansion {
            params.push(("query_expansion", expansion.clone()));
        }
        params
    }
}

/// A single engine command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TableCreate(TableSpec),
    TableRemove { name: String },
    TableList,
    ColumnCreate(ColumnSpec),
    ColumnRemove { table: String, name: String },
    ColumnList { table: String },
    Load { table: String, values: Vec<Record> },
    Delete { table: String, key: String },
    Select(SelectOptions),
    Dump { tables: Vec<String> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::TableCreate(_) => "table_create",
            Command::TableRemove { .. } => "table_remove",
            Command::TableList => "table_list",
            Command::ColumnCreate(_) => "column_create",
            Command::ColumnRemove { .. } => "column_remove",
            Command::ColumnList { .. } => "column_list",
            Command::Load { .. } => "load",
            Command::Delete { .. } => "delete",
            Command::Select(_) => "select",
            Command::Dump { .. } => "dump",
        }
    }

    /// Whether the command only reads engine state.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::TableList | Command::ColumnList { .. } | Command::Select(_) | Command::Dump { .. }
        )
    }

    /// Flat parameters, excluding the `load` payload.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Command::TableCreate(spec) => {
                let mut params = vec![("name", spec.name.clone()), ("flags", spec.flags())];
                if let Some(ref key_type) = spec.key_type {
                    params.push(("key_type", key_type.clone()));
                }
                if let Some(ref tokenizer) = spec.default_tokenizer {
                    params.push(("default_tokenizer", tokenizer.clone()));
                }
                params
            }
            Command::TableRemove { name } => vec![("name", name.clone())],
            Command::TableList => Vec::new(),
            Command::ColumnCreate(spec) => {
                let mut params = vec![
                    ("table", spec.table.clone()),
                    ("name", spec.name.clone()),
                    ("flags", spec.flags()),
                    ("type", spec.value_type.clone()),
                ];
                if let Some(ref source) = spec.source {
                    params.push(("source", source.clone()));
                }
                params
            }
            Command::ColumnRemove { table, name } => {
                vec![("table", table.clone()), ("name", name.clone())]
            }
            Command::ColumnList { table } => vec![("table", table.clone())],
            Command::Load { table, .. } => {
                vec![("table", table.clone()), ("input_type", "json".to_string())]
            }
            Command::Delete { table, key } => vec![("table", table.clone()), ("key", key.clone())],
            Command::Select(options) => options.params(),
            Command::Dump { tables } if tables.is_empty() => Vec::new(),
            Command::Dump { tables } => vec![("tables", tables.join(","))],
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        for (name, value) in self.params() {
            write!(f, " --{} {}", name, value)?;
        }
        Ok(())
    }
}

/// Entry of `table_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub kind: TableKind,
    pub key_type: Option<String>,
}

/// Entry of `column_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub value_type: String,
    pub sources: Vec<String>,
}

/// Tabular result: a header row of column names, then data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-name keyed records.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Record>()
            })
            .collect()
    }
}

/// One drilldown (facet) result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drilldown {
    pub column: String,
    /// Number of distinct groups.
    pub found: u64,
    pub records: RecordSet,
}

/// `select` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectReply {
    pub found: u64,
    pub records: RecordSet,
    pub drilldowns: Vec<Drilldown>,
}

/// Reply to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done(bool),
    Count(u64),
    Tables(Vec<TableInfo>),
    Columns(Vec<ColumnInfo>),
    Select(SelectReply),
    Dump(String),
}

impl Reply {
    fn unexpected(command: &'static str, expected: &'static str) -> EngineError {
        EngineError::UnexpectedReply { command, expected }
    }

    pub fn into_done(self, command: &'static str) -> Result<bool, EngineError> {
        match self {
            Reply::Done(done) => Ok(done),
            _ => Err(Self::unexpected(command, "boolean")),
        }
    }

    pub fn into_count(self, command: &'static str) -> Result<u64, EngineError> {
        match self {
            Reply::Count(count) => Ok(count),
            _ => Err(Self::unexpected(command, "count")),
        }
    }

    pub fn into_tables(self) -> Result<Vec<TableInfo>, EngineError> {
        match self {
            Reply::Tables(tables) => Ok(tables),
            _ => Err(Self::unexpected("table_list", "tables")),
        }
    }

    pub fn into_columns(self) -> Result<Vec<ColumnInfo>, EngineError> {
        match self {
            Reply::Columns(columns) => Ok(columns),
            _ => Err(Self::unexpected("column_list", "columns")),
        }
    }

    pub fn into_select(self) -> Result<SelectReply, EngineError> {
        match self {
            Reply::Select(reply) => Ok(reply),
            _ => Err(Self::unexpected("select", "records")),
        }
    }

    pub fn into_dump(self) -> Result<String, EngineError> {
        match self {
            Reply::Dump(text) => Ok(text),
            _ => Err(Self::unexpected("dump", "text")),
        }
    }
}
