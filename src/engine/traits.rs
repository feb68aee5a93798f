// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use super::command::{ColumnInfo, Command, Record, Reply, SelectOptions, SelectReply, TableInfo};

/// Engine return code for invalid arguments (duplicate names, bad syntax).
pub const RC_INVALID_ARGUMENT: i32 = -22;

/// Engine return code for a missing object.
pub const RC_NOT_FOUND: i32 = -2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Structured failure reported by the engine.
    #[error("{command} failed (rc={code}): {message}")]
    Command {
        command: &'static str,
        code: i32,
        message: String,
    },
    #[error("engine transport error: {0}")]
    Transport(String),
    #[error("unexpected reply to {command}: expected {expected}")]
    UnexpectedReply {
        command: &'static str,
        expected: &'static str,
    },
}

impl EngineError {
    pub fn command(command: &'static str, code: i32, message: impl Into<String>) -> Self {
        EngineError::Command {
            command,
            code,
            message: message.into(),
        }
    }

    /// Whether the engine refused to create an object because the name is taken.
    pub fn is_duplicate_object(&self) -> bool {
        match self {
            EngineError::Command { message, .. } => {
                message.contains("already used name") || message.contains("already exists")
            }
            _ => false,
        }
    }
}

/// The backing engine, consumed only through its command protocol.
///
/// Implementations execute one [`Command`] at a time; the convenience methods
/// unwrap the reply shape each command is expected to produce.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn execute(&self, command: Command) -> Result<Reply, EngineError>;

    async fn table_list(&self) -> Result<Vec<TableInfo>, EngineError> {
        self.execute(Command::TableList).await?.into_tables()
    }

    async fn table_exists(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.table_list().await?.iter().any(|t| t.name == name))
    }

    async fn column_list(&self, table: &str) -> Result<Vec<ColumnInfo>, EngineError> {
        self.execute(Command::ColumnList { table: table.to_string() })
            .await?
            .into_columns()
    }

    async fn select(&self, options: SelectOptions) -> Result<SelectReply, EngineError> {
        self.execute(Command::Select(options)).await?.into_select()
    }

    /// Load records, returning the number of records the engine accepted.
    async fn load(&self, table: &str, values: Vec<Record>) -> Result<u64, EngineError> {
        self.execute(Command::Load {
            table: table.to_string(),
            values,
        })
        .await?
        .into_count("load")
    }

    async fn dump(&self, tables: Vec<String>) -> Result<String, EngineError> {
        self.execute(Command::Dump { tables }).await?.into_dump()
    }
}
