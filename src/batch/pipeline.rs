// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document batch processing.
//!
//! ```text
//! records ──validate──> translate ──> execute (one command per record, in order)
//!             │                            │
//!             └─ unknown fields:           └─ per-document failures are
//!                rejected, zero writes        collected, never abort
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::record::{BatchMessage, BatchOutcome, BatchRecord, BatchStatus};
use crate::domain::{Domain, DomainSchema};
use crate::engine::{Command, Record, Reply, KEY_COLUMN};
use crate::error::{GatewayError, Result};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Delete,
}

/// One record's engine command.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedCommand {
    pub operation: Operation,
    pub id: String,
    pub command: Command,
}

/// Counters accumulated while executing a batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExecutionReport {
    pub adds: u64,
    pub deletes: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct BatchPipeline {
    domain: Arc<Domain>,
    schema: OnceCell<DomainSchema>,
}

impl BatchPipeline {
    pub fn new(domain: Arc<Domain>) -> Self {
        Self {
            domain,
            schema: OnceCell::new(),
        }
    }

    /// Field schema, read from the engine once per pipeline.
    async fn schema(&self) -> Result<&DomainSchema> {
        self.schema.get_or_try_init(|| self.domain.schema()).await
    }

    /// Reject the batch if any add record names an undefined field.
    pub async fn validate(&self, records: &[BatchRecord]) -> Result<()> {
        let schema = self.schema().await?;
        let mut unknown_fields: Vec<String> = Vec::new();
        for record in records {
            if let BatchRecord::Add { fields, .. } = record {
                for name in fields.keys() {
                    if schema.field(name).is_none() && !unknown_fields.contains(name) {
                        unknown_fields.push(name.clone());
                    }
                }
            }
        }
        if unknown_fields.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::DocumentValidation { unknown_fields })
        }
    }

    pub fn translate(&self, records: &[BatchRecord]) -> Vec<TranslatedCommand> {
        let table = self.domain.table_name().to_string();
        records
            .iter()
            .map(|record| match record {
                BatchRecord::Add { id, fields, .. } => {
                    let mut values = Record::new();
                    values.insert(KEY_COLUMN.to_string(), Value::String(id.as_key()));
                    values.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    TranslatedCommand {
                        operation: Operation::Add,
                        id: id.as_key(),
                        command: Command::Load {
                            table: table.clone(),
                            values: vec![values],
                        },
                    }
                }
                BatchRecord::Delete { id, .. } => TranslatedCommand {
                    operation: Operation::Delete,
                    id: id.as_key(),
                    command: Command::Delete {
                        table: table.clone(),
                        key: id.as_key(),
                    },
                },
            })
            .collect()
    }

    /// Run commands strictly in order. Failures are recorded and skipped.
    pub async fn execute(&self, commands: Vec<TranslatedCommand>) -> ExecutionReport {
        let engine = self.domain.engine();
        let mut report = ExecutionReport::default();

        for translated in commands {
            let TranslatedCommand { operation, id, command } = translated;
            debug!(domain = %self.domain.name(), id = %id, ?operation, "Applying document");
            match (operation, engine.execute(command).await) {
                (Operation::Add, Ok(_)) => report.adds += 1,
                (Operation::Delete, Ok(Reply::Done(false))) => {
                    report.deletes += 1;
                    report.warnings.push(format!("document not found: {}", id));
                }
                (Operation::Delete, Ok(_)) => report.deletes += 1,
                (_, Err(e)) => {
                    warn!(domain = %self.domain.name(), id = %id, error = %e, "Document failed");
                    report.errors.push(format!("{}: {}", id, e));
                }
            }
        }
        report
    }

    pub fn format_result(report: ExecutionReport) -> BatchOutcome {
        BatchOutcome {
            status: if report.errors.is_empty() {
                BatchStatus::Success
            } else {
                BatchStatus::Error
            },
            adds: report.adds,
            deletes: report.deletes,
            errors: report.errors.into_iter().map(BatchMessage::new).collect(),
            warnings: report.warnings.into_iter().map(BatchMessage::new).collect(),
        }
    }

    /// Validate, translate and execute a batch.
    ///
    /// Undefined fields turn into an `error` outcome with nothing written.
    /// Other failures (engine unreachable while reading the schema) are
    /// returned as errors.
    pub async fn process(&self, records: Vec<BatchRecord>) -> Result<BatchOutcome> {
        let start = Instant::now();
        metrics::record_batch_size(records.len());

        if let Err(e) = self.validate(&records).await {
            return match e {
                GatewayError::DocumentValidation { unknown_fields } => {
                    metrics::record_batch_documents("validate", "rejected", records.len());
                    warn!(
                        domain = %self.domain.name(),
                        fields = ?unknown_fields,
                        "Batch rejected, undefined fields"
                    );
                    Ok(BatchOutcome::rejected(
                        unknown_fields.iter().map(|f| format!("undefined field: {}", f)),
                    ))
                }
                other => Err(other),
            };
        }

        let commands = self.translate(&records);
        let report = self.execute(commands).await;
        metrics::record_batch_documents("add", "success", report.adds as usize);
        metrics::record_batch_documents("delete", "success", report.deletes as usize);
        metrics::record_batch_documents("any", "error", report.errors.len());

        let outcome = Self::format_result(report);
        info!(
            domain = %self.domain.name(),
            adds = outcome.adds,
            deletes = outcome.deletes,
            errors = outcome.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );
        Ok(outcome)
    }
}
