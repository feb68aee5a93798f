// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # CloudSearch Gateway
//!
//! A CloudSearch-compatible (API version `2011-02-01`) front end for an
//! embedded full-text search engine.
//!
//! ## Architecture
//!
//! Domains, index fields and document batches are mapped onto the engine's
//! native tables and columns:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Gateway                            │
//! │  • Configuration actions (CreateDomain, DefineIndexField…)  │
//! │  • Document batches (SDF as JSON or XML)                    │
//! │  • Search (q / bq / facet / rank / return-fields)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Domain Registry / Index Fields              │
//! │  • Name validation, domain ↔ table mapping                 │
//! │  • Option legality, in-place type migration                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Engine (command protocol)              │
//! │  • InMemoryEngine for tests and embedded runs               │
//! │  • HttpEngine for a real engine over `GET /d/<command>`     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per domain `companies` the engine holds:
//!
//! | table                     | purpose                                  |
//! |---------------------------|------------------------------------------|
//! | `companies`               | documents, one column per index field    |
//! | `companies_BigramTerms`   | bigram terms backing every text field    |
//! | `companies_configurations`| field options, audit stamps, settings    |
//! | `companies_synonyms`      | synonym dictionary (optional)            |
//! | `companies_<field>`       | lookup table of a uint or literal field  |
//!
//! ## Quick Start
//!
//! ```rust
//! use cloudsearch_gateway::{DocumentRequest, FieldType, Gateway, GatewayConfig, RequestContext};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway = Gateway::in_memory(GatewayConfig::default());
//!
//! let domain = gateway.registry().domain("companies").unwrap();
//! domain.create().await.unwrap();
//! domain.index_field("name", FieldType::Text).create().await.unwrap();
//!
//! let batch = r#"[{"type": "add", "id": "1", "version": 1, "fields": {"name": "Hongo Tokyo"}}]"#;
//! let context = RequestContext::named("companies");
//! let response = gateway
//!     .handle_documents(&DocumentRequest::new(context.clone(), "application/json", batch))
//!     .await;
//! assert_eq!(response.body["adds"], 1);
//!
//! let response = gateway.handle_search(&context, [("q", "Tokyo")]).await;
//! assert_eq!(response.body["hits"]["found"], 1);
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`Gateway`] and its three API surfaces
//! - [`domain`]: domains, their registry and configuration store
//! - [`field`]: index fields, options and type migration
//! - [`batch`]: SDF decoding and the document batch pipeline
//! - [`search`]: query translators, compiler and response envelopes
//! - [`engine`]: engine command protocol and its implementations

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod engine;
pub mod error;
pub mod field;
pub mod metrics;
pub mod search;

pub use batch::{BatchOutcome, BatchPipeline, BatchRecord, BatchStatus, DocumentId, SdfError};
pub use config::GatewayConfig;
pub use coordinator::{ApiError, ApiResponse, DocumentRequest, Gateway, OptionState};
pub use domain::{Domain, DomainRegistry, DomainSchema, RequestContext};
pub use engine::{Engine, EngineError, HttpEngine, InMemoryEngine, RetryConfig};
pub use error::{GatewayError, MigrationPhase, Result, ValidationError};
pub use field::{FieldDefinition, FieldOption, FieldOptions, FieldType, IndexField};
pub use metrics::LatencyTimer;
pub use search::{SearchErrorResponse, SearchParams, SearchQueryCompiler, SearchResponse};
