// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backing engine access.
//!
//! - [`Engine`]: async command seam shared by both backends
//! - [`InMemoryEngine`]: process-local tables, used embedded and in tests
//! - [`HttpEngine`]: remote engine over its HTTP command interface

pub mod command;
mod expr;
pub mod http;
pub mod memory;
pub mod retry;
pub mod traits;

pub use command::{
    quote_literal, ColumnInfo, ColumnKind, ColumnSpec, Command, Drilldown, Record, RecordSet, Reply, SelectOptions,
    SelectReply, TableInfo, TableKind, TableSpec, ID_COLUMN, KEY_COLUMN, NSUBRECS_COLUMN,
};
pub use http::HttpEngine;
pub use memory::InMemoryEngine;
pub use retry::RetryConfig;
pub use traits::{Engine, EngineError};
