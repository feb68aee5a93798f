// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document service (`/documents/batch`).

use serde_json::json;
use tracing::{error, warn};

use super::types::{ApiError, ApiResponse};
use super::Gateway;
use crate::batch::{sdf, BatchPipeline, SdfFormat};
use crate::domain::RequestContext;

/// One document batch upload as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequest {
    pub context: RequestContext,
    /// `Content-Type` header, if sent
    pub content_type: Option<String>,
    /// `Content-Length` header, if sent
    pub content_length: Option<u64>,
    pub body: String,
}

impl DocumentRequest {
    /// Request with `Content-Type` and a `Content-Length` matching `body`.
    pub fn new(context: RequestContext, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            context,
            content_type: Some(content_type.into()),
            content_length: Some(body.len() as u64),
            body,
        }
    }

    #[must_use]
    pub fn without_content_length(mut self) -> Self {
        self.content_length = None;
        self
    }
}

impl Gateway {
    /// Decode and apply one SDF batch.
    ///
    /// | condition                          | status |
    /// |------------------------------------|--------|
    /// | missing or unsupported content type| 400    |
    /// | missing `Content-Length`           | 401    |
    /// | undecodable payload, bad domain    | 400    |
    /// | engine failure outside a document  | 502    |
    /// | otherwise (including doc errors)   | 200    |
    pub async fn handle_documents(&self, request: &DocumentRequest) -> ApiResponse {
        let content_type = request.content_type.as_deref().unwrap_or_default();
        if SdfFormat::from_content_type(content_type).is_none() {
            return ApiError::new(
                400,
                "InvalidContentType",
                format!("Invalid Content-Type: '{}'", content_type),
            )
            .into();
        }
        if request.content_length.is_none() {
            return ApiError::new(401, "MissingContentLength", "Content-Length is required").into();
        }

        let domain = match self.domain(&request.context).await {
            Ok(domain) => domain,
            Err(e) => return ApiError::from(e).into(),
        };
        let records = match sdf::decode(content_type, &request.body) {
            Ok(records) => records,
            Err(e) => {
                warn!(domain = %domain.name(), error = %e, "Undecodable document batch");
                return ApiError::new(400, "InvalidDocument", e.to_string()).into();
            }
        };

        match BatchPipeline::new(domain.clone()).process(records).await {
            Ok(outcome) => ApiResponse::ok(json!(outcome)),
            Err(e) => {
                error!(domain = %domain.name(), error = %e, "Document batch failed");
                ApiError::new(502, "InternalFailure", e.to_string()).into()
            }
        }
    }
}
