// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway coordinator.
//!
//! The [`Gateway`] ties together the engine handle, the domain registry and
//! the three API surfaces:
//!
//! ```text
//!                 ┌──────────── Gateway ────────────┐
//! Action=...  ──> │ configuration  (config_api.rs)  │
//! SDF batch   ──> │ documents      (document_api.rs)│ ──> DomainRegistry ──> Arc<dyn Engine>
//! q/bq/...    ──> │ search         (search_api.rs)  │
//!                 └─────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use cloudsearch_gateway::{Gateway, GatewayConfig};
//! use std::collections::BTreeMap;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway = Gateway::in_memory(GatewayConfig::default());
//!
//! let mut params = BTreeMap::new();
//! params.insert("Action".to_string(), "CreateDomain".to_string());
//! params.insert("Version".to_string(), "2011-02-01".to_string());
//! params.insert("DomainName".to_string(), "companies".to_string());
//!
//! let response = gateway.handle_config_action(&params).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body["DomainStatus"]["DomainName"], "companies");
//! # }
//! ```

mod config_api;
mod document_api;
mod search_api;
mod types;

pub use document_api::DocumentRequest;
pub use types::{ApiError, ApiResponse, OptionState};

use std::sync::Arc;

use tracing::info;

use crate::config::GatewayConfig;
use crate::domain::{Domain, DomainRegistry, RequestContext};
use crate::engine::{Engine, EngineError, HttpEngine, InMemoryEngine};
use crate::error::Result;

/// Front door for every API call.
///
/// `Send + Sync`; share it behind an `Arc` between request handlers.
pub struct Gateway {
    config: GatewayConfig,
    engine: Arc<dyn Engine>,
    registry: DomainRegistry,
}

impl Gateway {
    pub fn new(config: GatewayConfig, engine: Arc<dyn Engine>) -> Self {
        Self {
            registry: DomainRegistry::new(engine.clone()),
            config,
            engine,
        }
    }

    /// Gateway over a fresh in-memory engine.
    pub fn in_memory(config: GatewayConfig) -> Self {
        Self::new(config, Arc::new(InMemoryEngine::new()))
    }

    /// Connect to the engine named by `engine_url`, or fall back to the
    /// in-memory engine when none is configured.
    pub async fn connect(config: GatewayConfig) -> Result<Self, EngineError> {
        let engine: Arc<dyn Engine> = match config.engine_url {
            Some(_) => Arc::new(HttpEngine::connect(&config).await?),
            None => {
                info!("No engine URL configured, using in-memory engine");
                Arc::new(InMemoryEngine::new())
            }
        };
        Ok(Self::new(config, engine))
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Resolve the domain a request addresses.
    pub async fn domain(&self, context: &RequestContext) -> Result<Arc<Domain>> {
        self.registry.resolve(context).await
    }
}
