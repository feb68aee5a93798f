// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search response envelopes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::compiler::CompiledSearch;
use crate::engine::{SelectReply, KEY_COLUMN, NSUBRECS_COLUMN};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchInfo {
    pub rid: String,
    #[serde(rename = "time-ms")]
    pub time_ms: u64,
    #[serde(rename = "cpu-time-ms")]
    pub cpu_time_ms: u64,
}

impl SearchInfo {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            rid: Uuid::new_v4().simple().to_string(),
            time_ms: elapsed.as_millis() as u64,
            cpu_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hits {
    pub found: u64,
    pub start: usize,
    pub hit: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetConstraint {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    pub constraints: Vec<FacetConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub rank: String,
    #[serde(rename = "match-expr")]
    pub match_expr: String,
    pub hits: Hits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<BTreeMap<String, Facet>>,
    pub info: SearchInfo,
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result values are always lists of strings.
fn values_of(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(text_of).collect(),
        scalar => vec![text_of(scalar)],
    }
}

impl SearchResponse {
    pub fn build(compiled: &CompiledSearch, reply: &SelectReply, elapsed: Duration) -> Self {
        let records = &reply.records;
        let key_index = records.column_index(KEY_COLUMN);
        let hit = records
            .rows
            .iter()
            .map(|row| {
                let id = key_index.and_then(|i| row.get(i)).map(text_of).unwrap_or_default();
                let data = compiled
                    .return_fields
                    .iter()
                    .filter_map(|field| {
                        let value = row.get(records.column_index(field)?)?;
                        Some((field.clone(), values_of(value)))
                    })
                    .collect();
                Hit { id, data }
            })
            .collect();

        let facets = if compiled.facets.is_empty() {
            None
        } else {
            Some(
                reply
                    .drilldowns
                    .iter()
                    .map(|drilldown| {
                        let key = drilldown.records.column_index(KEY_COLUMN);
                        let count = drilldown.records.column_index(NSUBRECS_COLUMN);
                        let constraints = drilldown
                            .records
                            .rows
                            .iter()
                            .map(|row| FacetConstraint {
                                value: key.and_then(|i| row.get(i)).map(text_of).unwrap_or_default(),
                                count: count.and_then(|i| row.get(i)).and_then(Value::as_u64).unwrap_or(0),
                            })
                            .collect();
                        (drilldown.column.clone(), Facet { constraints })
                    })
                    .collect(),
            )
        };

        Self {
            rank: compiled.rank.clone(),
            match_expr: compiled.match_expr.clone(),
            hits: Hits {
                found: reply.found,
                start: compiled.start,
                hit,
            },
            facets,
            info: SearchInfo::new(elapsed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub severity: String,
    pub code: String,
    pub message: String,
}

/// Failed search. Replaces raw engine errors on the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchErrorResponse {
    pub error: String,
    #[serde(flatten)]
    pub info: SearchInfo,
    pub messages: Vec<ErrorMessage>,
}

impl SearchErrorResponse {
    pub fn fatal(code: impl Into<String>, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            error: "info".to_string(),
            info: SearchInfo::new(elapsed),
            messages: vec![ErrorMessage {
                severity: "fatal".to_string(),
                code: code.into(),
                message: message.into(),
            }],
        }
    }
}
