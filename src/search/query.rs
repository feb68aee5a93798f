// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Boolean query AST.
//!
//! ```rust
//! use cloudsearch_gateway::search::{Query, QueryNode};
//!
//! let query = Query::phrase("tokyo").and(Query::field_text("product", "groonga"));
//! assert!(matches!(query.root, QueryNode::And(ref nodes) if nodes.len() == 2));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The query cannot be expressed as an engine filter.
///
/// Never surfaced to clients as a failure: the compiler turns it into a
/// filter that matches nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("untranslatable query: {0}")]
pub struct Untranslatable(pub String);

impl Untranslatable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub root: QueryNode,
}

impl Query {
    pub fn new(root: QueryNode) -> Self {
        Self { root }
    }

    /// Unscoped phrase, searched in the default fields.
    pub fn phrase(text: impl Into<String>) -> Self {
        Self::new(QueryNode::Phrase(text.into()))
    }

    pub fn field_text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(QueryNode::Field(FieldQuery {
            field: field.into(),
            value: QueryValue::Text(text.into()),
        }))
    }

    pub fn field_number(field: impl Into<String>, value: u64) -> Self {
        Self::new(QueryNode::Field(FieldQuery {
            field: field.into(),
            value: QueryValue::Number(value),
        }))
    }

    pub fn field_range(field: impl Into<String>, min: Option<u64>, max: Option<u64>) -> Self {
        Self::new(QueryNode::Field(FieldQuery {
            field: field.into(),
            value: QueryValue::Range { min, max },
        }))
    }

    pub fn and(self, other: Query) -> Self {
        Self::new(QueryNode::And(vec![self.root, other.root]))
    }

    pub fn or(self, other: Query) -> Self {
        Self::new(QueryNode::Or(vec![self.root, other.root]))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    /// `'text'`
    Phrase(String),
    /// `field:'text'`, `field:N`, `field:N..M`
    Field(FieldQuery),
    /// `(and a b ...)`
    And(Vec<QueryNode>),
    /// `(or a b ...)`
    Or(Vec<QueryNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldQuery {
    pub field: String,
    pub value: QueryValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Text(String),
    Number(u64),
    /// Inclusive on both ends; `None` is unbounded.
    Range { min: Option<u64>, max: Option<u64> },
}

/// Quote text as a boolean-query literal.
pub fn quote_bq(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

impl std::fmt::Display for QueryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryNode::Phrase(text) => f.write_str(&quote_bq(text)),
            QueryNode::Field(FieldQuery { field, value }) => match value {
                QueryValue::Text(text) => write!(f, "{}:{}", field, quote_bq(text)),
                QueryValue::Number(n) => write!(f, "{}:{}", field, n),
                QueryValue::Range { min, max } => {
                    write!(f, "{}:", field)?;
                    if let Some(min) = min {
                        write!(f, "{}", min)?;
                    }
                    f.write_str("..")?;
                    if let Some(max) = max {
                        write!(f, "{}", max)?;
                    }
                    Ok(())
                }
            },
            QueryNode::And(nodes) | QueryNode::Or(nodes) => {
                let op = if matches!(self, QueryNode::And(_)) { "and" } else { "or" };
                write!(f, "({}", op)?;
                for node in nodes {
                    write!(f, " {}", node)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.root.fmt(f)
    }
}
