// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the gateway.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding service is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `gcs_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `backend`: memory, http
//! - `command`: engine command name (select, load, ...)
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE - Command execution
// ═══════════════════════════════════════════════════════════════════════════

/// Record an executed engine command
pub fn record_engine_command(backend: &str, command: &str, status: &str) {
    counter!(
        "gcs_engine_commands_total",
        "backend" => backend.to_string(),
        "command" => command.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record engine command latency
pub fn record_engine_latency(backend: &str, command: &str, duration: Duration) {
    histogram!(
        "gcs_engine_command_seconds",
        "backend" => backend.to_string(),
        "command" => command.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set engine reachability (1 = reachable, 0 = unreachable)
pub fn set_engine_healthy(backend: &str, healthy: bool) {
    gauge!(
        "gcs_engine_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEMA - Domains and index fields
// ═══════════════════════════════════════════════════════════════════════════

/// Record a domain lifecycle operation (create, delete)
pub fn record_domain_operation(operation: &str, status: &str) {
    counter!(
        "gcs_domain_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an index field operation (create, delete, save)
pub fn record_field_operation(operation: &str, status: &str) {
    counter!(
        "gcs_field_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a field migration and the phase it ended in
pub fn record_field_migration(kind: &str, phase: &str) {
    counter!(
        "gcs_field_migrations_total",
        "kind" => kind.to_string(),
        "phase" => phase.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENTS - Batch pipeline
// ═══════════════════════════════════════════════════════════════════════════

/// Record documents processed by a batch, by operation and outcome
pub fn record_batch_documents(operation: &str, status: &str, count: usize) {
    counter!(
        "gcs_batch_documents_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(count as u64);
}

/// Record batch size
pub fn record_batch_size(count: usize) {
    histogram!("gcs_batch_size").record(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH - Query execution
// ═══════════════════════════════════════════════════════════════════════════

/// Record a search request
pub fn record_search_request(status: &str) {
    counter!(
        "gcs_search_requests_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record search latency
pub fn record_search_latency(duration: Duration) {
    histogram!("gcs_search_seconds").record(duration.as_secs_f64());
}

/// Record a query that could not be translated
pub fn record_untranslatable_query(kind: &str) {
    counter!(
        "gcs_untranslatable_queries_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// API - Configuration actions
// ═══════════════════════════════════════════════════════════════════════════

/// Record a configuration API action
pub fn record_api_action(action: &str, status: &str) {
    counter!(
        "gcs_api_actions_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Timer that records engine command latency on drop.
pub struct LatencyTimer {
    backend: &'static str,
    command: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(backend: &'static str, command: &'static str) -> Self {
        Self {
            backend,
            command,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_engine_latency(self.backend, self.command, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the API doesn't panic without an installed recorder.

    #[test]
    fn test_record_engine_command() {
        record_engine_command("memory", "select", "success");
        record_engine_command("http", "load", "error");
        record_engine_latency("http", "load", Duration::from_millis(5));
        set_engine_healthy("http", false);
    }

    #[test]
    fn test_schema_metrics() {
        record_domain_operation("create", "success");
        record_field_operation("save", "error");
        record_field_migration("change_type", "reloaded");
    }

    #[test]
    fn test_document_and_search_metrics() {
        record_batch_documents("add", "success", 10);
        record_batch_size(10);
        record_search_request("success");
        record_search_latency(Duration::from_micros(250));
        record_untranslatable_query("bq");
        record_api_action("CreateDomain", "success");
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("memory", "select");
            std::thread::sleep(Duration::from_micros(10));
        }
        // Timer recorded on drop
    }
}
