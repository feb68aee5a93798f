// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search service (`/search`).
//!
//! # Flow
//!
//! ```text
//! search(context, params)
//!       │
//!       ├─→ resolve domain           (missing → CS-UnknownDomain)
//!       ├─→ schema snapshot
//!       ├─→ SearchQueryCompiler      (untranslatable → zero hits, not an error)
//!       ├─→ engine select            (failure → CS-InternalError)
//!       └─→ SearchResponse
//! ```

use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use super::types::ApiResponse;
use super::Gateway;
use crate::domain::RequestContext;
use crate::metrics;
use crate::search::{SearchErrorResponse, SearchParams, SearchQueryCompiler, SearchResponse};

const UNKNOWN_DOMAIN: &str = "CS-UnknownDomain";
const INVALID_PARAMETER: &str = "CS-InvalidParameter";
const INTERNAL_ERROR: &str = "CS-InternalError";

fn status_for(code: &str) -> u16 {
    match code {
        UNKNOWN_DOMAIN => 404,
        INVALID_PARAMETER => 400,
        _ => 500,
    }
}

impl Gateway {
    /// Run one search. Every failure is reported through the search error
    /// envelope, never as a raw engine error.
    pub async fn search(
        &self,
        context: &RequestContext,
        params: &SearchParams,
    ) -> Result<SearchResponse, SearchErrorResponse> {
        let start = Instant::now();
        let result = self.run_search(context, params, start).await;
        metrics::record_search_request(if result.is_ok() { "success" } else { "error" });
        metrics::record_search_latency(start.elapsed());
        result
    }

    async fn run_search(
        &self,
        context: &RequestContext,
        params: &SearchParams,
        start: Instant,
    ) -> Result<SearchResponse, SearchErrorResponse> {
        let fail = |code: &str, message: String| {
            warn!(code, message = %message, "Search failed");
            SearchErrorResponse::fatal(code, message, start.elapsed())
        };

        let domain = self
            .domain(context)
            .await
            .map_err(|e| fail(UNKNOWN_DOMAIN, e.to_string()))?;
        match domain.exists().await {
            Ok(true) => {}
            Ok(false) => return Err(fail(UNKNOWN_DOMAIN, format!("Domain not found: {}", domain.name()))),
            Err(e) => return Err(fail(INTERNAL_ERROR, e.to_string())),
        }

        let schema = domain.schema().await.map_err(|e| fail(INTERNAL_ERROR, e.to_string()))?;
        let compiled = SearchQueryCompiler::new(&schema, self.config.default_search_size).compile(params);
        debug!(
            domain = %domain.name(),
            filter = ?compiled.options.filter,
            untranslatable = compiled.untranslatable,
            "Search compiled"
        );

        let reply = self
            .engine
            .select(compiled.options.clone())
            .await
            .map_err(|e| fail(INTERNAL_ERROR, e.to_string()))?;
        Ok(SearchResponse::build(&compiled, &reply, start.elapsed()))
    }

    /// Search from raw query-string pairs, rendered as status and JSON body.
    pub async fn handle_search<'a>(
        &self,
        context: &RequestContext,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> ApiResponse {
        let start = Instant::now();
        let params = match SearchParams::from_pairs(pairs) {
            Ok(params) => params,
            Err(e) => {
                metrics::record_search_request("invalid");
                let envelope = SearchErrorResponse::fatal(INVALID_PARAMETER, e.to_string(), start.elapsed());
                return ApiResponse {
                    status: status_for(INVALID_PARAMETER),
                    body: json!(envelope),
                };
            }
        };

        match self.search(context, &params).await {
            Ok(response) => ApiResponse::ok(json!(response)),
            Err(envelope) => {
                let code = envelope.messages.first().map(|m| m.code.as_str()).unwrap_or(INTERNAL_ERROR);
                ApiResponse {
                    status: status_for(code),
                    body: json!(envelope),
                }
            }
        }
    }
}
