// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the gateway.
//!
//! # Example
//!
//! ```
//! use cloudsearch_gateway::GatewayConfig;
//!
//! // Minimal config (uses defaults)
//! let config = GatewayConfig::default();
//! assert_eq!(config.api_version, "2011-02-01");
//! assert_eq!(config.default_search_size, 10);
//!
//! // Full config
//! let config = GatewayConfig {
//!     engine_url: Some("http://localhost:10041".into()),
//!     base_host: "search.example.com".into(),
//!     region: "ap-northeast-1".into(),
//!     ..Default::default()
//! };
//! assert!(config.endpoint("doc", "books", "abc").starts_with("doc-books-abc."));
//! ```

use serde::Deserialize;

/// Configuration for the gateway.
///
/// All fields have defaults. Set `engine_url` to talk to an engine over HTTP;
/// leave it unset to run on the in-memory engine.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Engine HTTP base URL (e.g., "http://localhost:10041")
    #[serde(default)]
    pub engine_url: Option<String>,

    /// Host suffix used when building domain endpoints
    #[serde(default = "default_base_host")]
    pub base_host: String,

    /// Region segment of domain endpoints
    #[serde(default = "default_region")]
    pub region: String,

    /// Configuration API version every request must carry
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Page size when a search request has no `size`
    #[serde(default = "default_search_size")]
    pub default_search_size: usize,

    /// HTTP transport timeout for engine commands
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Status checks attempted before giving up on the engine at startup
    #[serde(default = "default_engine_connect_retries")]
    pub engine_connect_retries: usize,
}

fn default_base_host() -> String { "localhost".to_string() }
fn default_region() -> String { "us-east-1".to_string() }
fn default_api_version() -> String { "2011-02-01".to_string() }
fn default_search_size() -> usize { 10 }
fn default_engine_timeout_ms() -> u64 { 30_000 }
fn default_engine_connect_retries() -> usize { 5 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            engine_url: None,
            base_host: default_base_host(),
            region: default_region(),
            api_version: default_api_version(),
            default_search_size: default_search_size(),
            engine_timeout_ms: default_engine_timeout_ms(),
            engine_connect_retries: default_engine_connect_retries(),
        }
    }
}

impl GatewayConfig {
    /// Endpoint host for a domain, e.g. `search-books-<id>.us-east-1.localhost`.
    pub fn endpoint(&self, service: &str, name: &str, id: &str) -> String {
        format!("{}-{}-{}.{}.{}", service, name, id, self.region, self.base_host)
    }
}
