// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Domain resolution and the per-process domain handle cache.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::Regex;
use tracing::debug;

use super::name::validate_domain_name;
use super::Domain;
use crate::engine::Engine;
use crate::error::{GatewayError, Result};

static HOST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:doc|search)-([^.]+)-([^-.]+)\.").expect("valid host pattern"));
static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/gcs/([^/]+)/").expect("valid path pattern"));

/// Where a request can name its domain, in priority order.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub domain_name: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
}

impl RequestContext {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            domain_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Domain name from a request: explicit name, then `Host`, then path.
pub fn resolve_name(context: &RequestContext) -> Result<String> {
    if let Some(name) = context.domain_name.as_deref().filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    if let Some(captures) = context.host.as_deref().and_then(|h| HOST_PATTERN.captures(h)) {
        return Ok(captures[1].to_string());
    }
    if let Some(captures) = context.path.as_deref().and_then(|p| PATH_PATTERN.captures(p)) {
        return Ok(captures[1].to_string());
    }
    Err(GatewayError::validation("no domain name"))
}

pub struct DomainRegistry {
    engine: Arc<dyn Engine>,
    domains: DashMap<String, Arc<Domain>>,
}

impl DomainRegistry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            domains: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Handle for `name`, validating the name first.
    ///
    /// Returns the cached handle when there is one. Otherwise the handle is
    /// fresh and not cached; only domains known to exist are cached.
    pub fn domain(&self, name: &str) -> Result<Arc<Domain>> {
        validate_domain_name(name)?;
        if let Some(domain) = self.domains.get(name) {
            return Ok(domain.clone());
        }
        Ok(Arc::new(Domain::new(name, self.engine.clone())))
    }

    /// Handle for `name`, cached if the domain exists in the engine.
    pub async fn open(&self, name: &str) -> Result<Arc<Domain>> {
        let domain = self.domain(name)?;
        if self.domains.contains_key(name) || !domain.exists().await? {
            return Ok(domain);
        }
        Ok(self.retain(domain))
    }

    /// Create the domain and cache its handle.
    pub async fn create(&self, name: &str) -> Result<Arc<Domain>> {
        let domain = self.domain(name)?;
        domain.create().await?;
        Ok(self.retain(domain))
    }

    /// Drop the cached handle of a deleted domain.
    pub fn forget(&self, name: &str) {
        if self.domains.remove(name).is_some() {
            debug!(domain = %name, "Domain handle evicted");
        }
    }

    /// Number of cached handles.
    pub fn cached_len(&self) -> usize {
        self.domains.len()
    }

    fn retain(&self, domain: Arc<Domain>) -> Arc<Domain> {
        self.domains
            .entry(domain.name().to_string())
            .or_insert_with(|| {
                debug!(domain = %domain.name(), "Caching domain handle");
                domain.clone()
            })
            .clone()
    }

    pub async fn resolve(&self, context: &RequestContext) -> Result<Arc<Domain>> {
        self.open(&resolve_name(context)?).await
    }

    /// Every existing domain, sorted by name.
    pub async fn list_all(&self) -> Result<Vec<Arc<Domain>>> {
        let mut names: Vec<String> = self
            .engine
            .table_list()
            .await?
            .into_iter()
            .map(|t| t.name)
            .filter(|name| !name.contains('_'))
            .collect();
        names.sort();
        names
            .iter()
            .map(|name| self.domain(name).map(|domain| self.retain(domain)))
            .collect()
    }
}
