// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document id. Purely numeric text is normalized to a number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawDocumentId")]
pub enum DocumentId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocumentId {
    Number(u64),
    Text(String),
}

impl From<RawDocumentId> for DocumentId {
    fn from(raw: RawDocumentId) -> Self {
        match raw {
            RawDocumentId::Number(n) => DocumentId::Number(n),
            RawDocumentId::Text(s) => DocumentId::from(s),
        }
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return DocumentId::Number(n);
            }
        }
        DocumentId::Text(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId::from(s.to_string())
    }
}

impl From<u64> for DocumentId {
    fn from(n: u64) -> Self {
        DocumentId::Number(n)
    }
}

impl DocumentId {
    /// Engine `_key` form.
    pub fn as_key(&self) -> String {
        match self {
            DocumentId::Number(n) => n.to_string(),
            DocumentId::Text(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentId::Number(n) => write!(f, "{}", n),
            DocumentId::Text(s) => f.write_str(s),
        }
    }
}

/// One add or delete in a document batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchRecord {
    Add {
        id: DocumentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(default)]
        fields: BTreeMap<String, Value>,
    },
    Delete {
        id: DocumentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },
}

impl BatchRecord {
    pub fn add(id: impl Into<DocumentId>, fields: BTreeMap<String, Value>) -> Self {
        BatchRecord::Add {
            id: id.into(),
            version: None,
            lang: None,
            fields,
        }
    }

    pub fn delete(id: impl Into<DocumentId>) -> Self {
        BatchRecord::Delete {
            id: id.into(),
            version: None,
        }
    }

    pub fn id(&self) -> &DocumentId {
        match self {
            BatchRecord::Add { id, .. } | BatchRecord::Delete { id, .. } => id,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, BatchRecord::Add { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMessage {
    pub message: String,
}

impl BatchMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result envelope of a processed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub adds: u64,
    pub deletes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BatchMessage>,
}

impl BatchOutcome {
    /// Outcome of a batch rejected before any write.
    pub fn rejected(messages: impl IntoIterator<Item = String>) -> Self {
        Self {
            status: BatchStatus::Error,
            adds: 0,
            deletes: 0,
            errors: messages.into_iter().map(BatchMessage::new).collect(),
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}
