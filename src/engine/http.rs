// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine client over the HTTP command interface.
//!
//! Commands are sent as `GET /d/<command>?<params>` (`load` is a `POST` with
//! the records as a JSON body). Replies use the envelope
//!
//! ```text
//! [[rc, start_time, elapsed, "message"?, ...], body]
//! ```
//!
//! where `rc == 0` means success. `dump` answers with plain text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::command::{
    ColumnInfo, ColumnKind, Command, Drilldown, RecordSet, Reply, SelectReply, TableInfo, TableKind,
    KEY_COLUMN,
};
use super::retry::{retry, RetryConfig};
use super::traits::{Engine, EngineError};
use crate::config::GatewayConfig;
use crate::metrics;

/// [`Engine`] implementation backed by a remote engine server.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: Client,
    base: Url,
    /// Backoff for transport failures of read-only commands.
    read_retry: RetryConfig,
}

impl HttpEngine {
    /// Build a client without contacting the server.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let mut base = Url::parse(base_url).map_err(|e| EngineError::Transport(format!("invalid engine url: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base,
            read_retry: RetryConfig::query(),
        })
    }

    #[must_use]
    pub fn with_read_retry(mut self, policy: RetryConfig) -> Self {
        self.read_retry = policy;
        self
    }

    /// Build a client from config and wait until the engine answers `status`.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, EngineError> {
        let url = config
            .engine_url
            .as_deref()
            .ok_or_else(|| EngineError::Transport("engine_url is not configured".to_string()))?;
        let engine = Self::new(url, Duration::from_millis(config.engine_timeout_ms))?;

        let policy = RetryConfig::startup().with_max_retries(config.engine_connect_retries);
        let status = retry("engine_status", &policy, || engine.status()).await;
        metrics::set_engine_healthy("http", status.is_ok());
        status?;

        info!(url = %engine.base, "Connected to engine");
        Ok(engine)
    }

    fn command_url(&self, name: &str) -> Result<Url, EngineError> {
        self.base
            .join(&format!("d/{}", name))
            .map_err(|e| EngineError::Transport(e.to_string()))
    }

    /// Server status object.
    pub async fn status(&self) -> Result<Value, EngineError> {
        let url = self.command_url("status")?;
        let text = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        parse_envelope("status", &text)
    }

    async fn send(&self, command: &Command) -> Result<String, EngineError> {
        let url = self.command_url(command.name())?;
        let params = command.params();
        let request = match command {
            Command::Load { values, .. } => self.client.post(url).query(&params).json(values),
            _ => self.client.get(url).query(&params),
        };
        request
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn execute(&self, command: Command) -> Result<Reply, EngineError> {
        let name = command.name();
        let _timer = metrics::LatencyTimer::new("http", name);
        debug!(command = %command, "Sending engine command");

        // Only transport failures are retried. Writes are never resent.
        let sent = if command.is_read_only() {
            retry(name, &self.read_retry, || self.send(&command)).await
        } else {
            self.send(&command).await
        };
        let result = match sent {
            Ok(text) => parse_reply(&command, &text),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => metrics::record_engine_command("http", name, "success"),
            Err(ref e) => {
                warn!(command = name, error = %e, "Engine command failed");
                metrics::record_engine_command("http", name, "error");
            }
        }
        result
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPLY PARSING
// ═══════════════════════════════════════════════════════════════════════════

/// Check the envelope header and return the body.
pub(crate) fn parse_envelope(command: &'static str, text: &str) -> Result<Value, EngineError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| EngineError::Transport(format!("{} returned invalid JSON: {}", command, e)))?;
    let Value::Array(mut parts) = value else {
        return Err(EngineError::UnexpectedReply { command, expected: "envelope" });
    };
    let header = parts
        .first()
        .and_then(Value::as_array)
        .ok_or(EngineError::UnexpectedReply { command, expected: "envelope header" })?;
    let rc = header.first().and_then(Value::as_i64).unwrap_or(0);
    if rc != 0 {
        let message = header.get(3).and_then(Value::as_str).unwrap_or("unknown error");
        return Err(EngineError::command(command, rc as i32, message));
    }
    Ok(if parts.len() > 1 { parts.swap_remove(1) } else { Value::Null })
}

fn parse_reply(command: &Command, text: &str) -> Result<Reply, EngineError> {
    let name = command.name();
    if matches!(command, Command::Dump { .. }) {
        // Dump bodies are plain text unless the engine reports an error.
        return match parse_envelope(name, text) {
            Err(e @ EngineError::Command { .. }) => Err(e),
            Ok(Value::String(body)) => Ok(Reply::Dump(body)),
            _ => Ok(Reply::Dump(text.trim_end().to_string())),
        };
    }

    let body = parse_envelope(name, text)?;
    match command {
        Command::TableList => parse_table_list(&body).map(Reply::Tables),
        Command::ColumnList { .. } => parse_column_list(&body).map(Reply::Columns),
        Command::Select(options) => {
            let mut reply = parse_select(&body)?;
            for (drilldown, column) in reply.drilldowns.iter_mut().zip(&options.drilldown) {
                drilldown.column = column.clone();
            }
            Ok(Reply::Select(reply))
        }
        Command::Load { .. } => body
            .as_u64()
            .map(Reply::Count)
            .ok_or(EngineError::UnexpectedReply { command: name, expected: "count" }),
        _ => body
            .as_bool()
            .map(Reply::Done)
            .ok_or(EngineError::UnexpectedReply { command: name, expected: "boolean" }),
    }
}

/// Header row of `[name, type]` pairs followed by data rows.
fn header_and_rows<'a>(command: &'static str, body: &'a Value) -> Result<(Vec<String>, &'a [Value]), EngineError> {
    let rows = body
        .as_array()
        .ok_or(EngineError::UnexpectedReply { command, expected: "rows" })?;
    let Some((header, data)) = rows.split_first() else {
        return Ok((Vec::new(), &[]));
    };
    let columns = header
        .as_array()
        .ok_or(EngineError::UnexpectedReply { command, expected: "header row" })?
        .iter()
        .map(|pair| {
            pair.get(0)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    Ok((columns, data))
}

fn cell_str<'a>(columns: &[String], row: &'a Value, name: &str) -> Option<&'a str> {
    let index = columns.iter().position(|c| c == name)?;
    row.get(index).and_then(Value::as_str)
}

pub(crate) fn parse_table_list(body: &Value) -> Result<Vec<TableInfo>, EngineError> {
    let (columns, rows) = header_and_rows("table_list", body)?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = cell_str(&columns, row, "name")?;
            Some(TableInfo {
                name: name.to_string(),
                kind: TableKind::from_flags(cell_str(&columns, row, "flags").unwrap_or_default()),
                key_type: cell_str(&columns, row, "domain").map(String::from),
            })
        })
        .collect())
}

pub(crate) fn parse_column_list(body: &Value) -> Result<Vec<ColumnInfo>, EngineError> {
    let (columns, rows) = header_and_rows("column_list", body)?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = cell_str(&columns, row, "name")?;
            if name == KEY_COLUMN {
                return None;
            }
            let sources = columns
                .iter()
                .position(|c| c == "source")
                .and_then(|i| row.get(i))
                .and_then(Value::as_array)
                .map(|s| {
                    s.iter()
                        .filter_map(Value::as_str)
                        .map(|source| source.rsplit('.').next().unwrap_or(source).to_string())
                        .collect()
                })
                .unwrap_or_default();
            Some(ColumnInfo {
                name: name.to_string(),
                kind: ColumnKind::from_flags(cell_str(&columns, row, "flags").unwrap_or_default()),
                value_type: cell_str(&columns, row, "range").unwrap_or_default().to_string(),
                sources,
            })
        })
        .collect())
}

/// `[[found], [[col, type], ...], row, row, ...]`
fn parse_result_set(body: &Value) -> Result<(u64, RecordSet), EngineError> {
    let parts = body
        .as_array()
        .ok_or(EngineError::UnexpectedReply { command: "select", expected: "result set" })?;
    let found = parts
        .first()
        .and_then(|f| f.get(0))
        .and_then(Value::as_u64)
        .ok_or(EngineError::UnexpectedReply { command: "select", expected: "hit count" })?;
    let rest = Value::Array(parts.iter().skip(1).cloned().collect());
    let (columns, rows) = header_and_rows("select", &rest)?;
    let records = RecordSet {
        columns,
        rows: rows
            .iter()
            .map(|row| row.as_array().cloned().unwrap_or_default())
            .collect(),
    };
    Ok((found, records))
}

pub(crate) fn parse_select(body: &Value) -> Result<SelectReply, EngineError> {
    let parts = body
        .as_array()
        .ok_or(EngineError::UnexpectedReply { command: "select", expected: "result sets" })?;
    let Some((main, facets)) = parts.split_first() else {
        return Err(EngineError::UnexpectedReply { command: "select", expected: "result sets" });
    };
    let (found, records) = parse_result_set(main)?;
    let drilldowns = facets
        .iter()
        .map(|facet| {
            parse_result_set(facet).map(|(found, records)| Drilldown {
                column: String::new(),
                found,
                records,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SelectReply { found, records, drilldowns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[test]
    fn test_envelope_error() {
        let text = r#"[[-22,1700000000.0,0.001,"already used name was assigned: <books>",[["grn_obj_register","db.c",1]]],false]"#;
        let err = parse_envelope("table_create", text).unwrap_err();
        assert!(err.is_duplicate_object());
        assert!(matches!(err, EngineError::Command { code: -22, .. }));
    }

    #[test]
    fn test_parse_done_and_count() {
        let list = Command::TableList;
        let tables = parse_reply(&list, r#"[[0,1.0,0.1],[[["id","UInt32"],["name","ShortText"],["flags","ShortText"],["domain","ShortText"]],[256,"books","TABLE_PAT_KEY|PERSISTENT","ShortText"]]]"#).unwrap();
        assert_eq!(
            tables,
            Reply::Tables(vec![TableInfo {
                name: "books".into(),
                kind: TableKind::Patricia,
                key_type: Some("ShortText".into()),
            }])
        );

        let load = Command::Load { table: "books".into(), values: Vec::new() };
        assert_eq!(parse_reply(&load, "[[0,1.0,0.1],3]").unwrap(), Reply::Count(3));

        let remove = Command::TableRemove { name: "books".into() };
        assert_eq!(parse_reply(&remove, "[[0,1.0,0.1],true]").unwrap(), Reply::Done(true));
    }

    #[test]
    fn test_parse_column_list_skips_key() {
        let body = json!([
            [["id", "UInt32"], ["name", "ShortText"], ["flags", "ShortText"], ["range", "ShortText"], ["source", "ShortText"]],
            [256, "_key", "COLUMN_SCALAR", "ShortText", []],
            [257, "tags", "COLUMN_VECTOR|PERSISTENT", "books_tags", []],
            [258, "books_name", "COLUMN_INDEX|WITH_POSITION|PERSISTENT", "books", ["books.name"]]
        ]);
        let columns = parse_column_list(&body).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].kind, ColumnKind::Vector);
        assert_eq!(columns[0].value_type, "books_tags");
        assert_eq!(columns[1].sources, vec!["name".to_string()]);
    }

    #[test]
    fn test_parse_select_with_drilldown() {
        let body = json!([
            [[2], [["_key", "ShortText"], ["age", "UInt32"]], ["a", 1], ["b", 2]],
            [[1], [["_key", "ShortText"], ["_nsubrecs", "Int32"]], ["tokyo", 2]]
        ]);
        let reply = parse_select(&body).unwrap();
        assert_eq!(reply.found, 2);
        assert_eq!(reply.records.columns, vec!["_key", "age"]);
        assert_eq!(reply.records.rows[1], vec![json!("b"), json!(2)]);
        assert_eq!(reply.drilldowns[0].records.rows[0][1], json!(2));
    }

    #[test]
    fn test_dump_is_plain_text() {
        let dump = Command::Dump { tables: Vec::new() };
        let text = "load --table books\n[\n[\"_key\"],\n[\"a\"]\n]\n";
        assert_eq!(
            parse_reply(&dump, text).unwrap(),
            Reply::Dump("load --table books\n[\n[\"_key\"],\n[\"a\"]\n]".into())
        );
    }

    /// Accepts connections and drops them unanswered, counting each one.
    async fn hangup_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });
        (url, connections)
    }

    #[tokio::test]
    async fn test_only_reads_are_retried() {
        let (url, connections) = hangup_server().await;
        let engine = HttpEngine::new(&url, Duration::from_secs(2))
            .unwrap()
            .with_read_retry(RetryConfig::test());

        let err = engine.execute(Command::TableList).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert_eq!(connections.load(Ordering::SeqCst), RetryConfig::test().max_retries);

        connections.store(0, Ordering::SeqCst);
        let err = engine
            .execute(Command::TableRemove { name: "books".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpEngine::new("not a url", Duration::from_secs(1)),
            Err(EngineError::Transport(_))
        ));
    }
}
