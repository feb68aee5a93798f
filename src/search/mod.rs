// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search request compilation.
//!
//! # Architecture
//!
//! ```text
//! q  ──simple──┐
//!              ├─> Query (AST) ──FilterTranslator──> engine filter script
//! bq ──boolean─┘                                         │
//!                                                        ▼
//! size/start/return-fields/facet/rank ──────> SelectOptions (SearchQueryCompiler)
//!                                                        │
//!                                    engine select ──────┘──> SearchResponse
//! ```
//!
//! # Boolean query language
//!
//! ```text
//! 'hongo tokyo'                  - phrase in the default search fields
//! name:'tokyo'                   - text field match
//! product:'groonga'              - literal field equality
//! age:20  age:10..20  age:..30   - uint equality and ranges
//! (and a b ...)  (or a b ...)    - boolean combination
//! ```
//!
//! Anything outside this grammar is untranslatable and matches nothing.

pub mod boolean;
mod compiler;
mod query;
mod response;
pub mod simple;
mod translator;

pub use compiler::{CompiledSearch, SearchParams, SearchQueryCompiler, DEFAULT_RANK, MATCH_NOTHING};
pub use query::{quote_bq, FieldQuery, Query, QueryNode, QueryValue, Untranslatable};
pub use response::{ErrorMessage, Facet, FacetConstraint, Hit, Hits, SearchErrorResponse, SearchInfo, SearchResponse};
pub use translator::FilterTranslator;
