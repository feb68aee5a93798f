// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the gateway's API surfaces.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::GatewayError;

/// Field lifecycle state reported by the configuration API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionState {
    /// Applied and indexed
    Active,
    /// Applied, waiting for `IndexDocuments`
    RequiresIndexDocuments,
    /// Being applied
    Processing,
}

impl OptionState {
    pub fn from_requires_index(requires_index_documents: bool) -> Self {
        if requires_index_documents {
            Self::RequiresIndexDocuments
        } else {
            Self::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::RequiresIndexDocuments => "RequiresIndexDocuments",
            Self::Processing => "Processing",
        }
    }
}

impl std::fmt::Display for OptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration/document API failure rendered as `{code, message}`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(400, "MissingParameter", format!("An input parameter \"{}\" that is mandatory for processing the request is not supplied.", name))
    }

    pub fn invalid_parameter(name: &str, value: &str) -> Self {
        Self::new(400, "InvalidParameterValue", format!("Invalid value \"{}\" for parameter \"{}\".", value, name))
    }

    pub fn invalid_action(action: &str) -> Self {
        Self::new(400, "InvalidAction", format!("The action {} is not valid for this web service.", action))
    }

    pub fn to_json(&self) -> Value {
        json!({ "code": self.code, "message": self.message })
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        match err {
            GatewayError::Validation(_) => Self::new(400, "ValidationError", message),
            GatewayError::FieldOptionConflict(_) => Self::new(400, "InvalidType", message),
            GatewayError::NotFound(_) => Self::new(409, "ResourceNotFound", message),
            GatewayError::DomainExists(_) => Self::new(409, "ResourceAlreadyExists", message),
            GatewayError::DocumentValidation { .. } => Self::new(400, "DocumentValidation", message),
            GatewayError::Sdf(_) => Self::new(400, "InvalidDocument", message),
            GatewayError::Engine(_) | GatewayError::Migration { .. } => Self::new(400, "InternalException", message),
        }
    }
}

/// Status and JSON body of one API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status,
            body: err.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_option_state_display() {
        assert_eq!(OptionState::from_requires_index(true).to_string(), "RequiresIndexDocuments");
        assert_eq!(OptionState::from_requires_index(false).to_string(), "Active");
    }

    #[test]
    fn test_gateway_error_mapping() {
        let err = ApiError::from(GatewayError::Validation(ValidationError::single("bad")));
        assert_eq!((err.status, err.code.as_str()), (400, "ValidationError"));

        let err = ApiError::from(GatewayError::NotFound("Domain not found: x".into()));
        assert_eq!((err.status, err.code.as_str()), (409, "ResourceNotFound"));
        assert_eq!(err.to_json()["message"], "Domain not found: x");
    }

    #[test]
    fn test_error_response() {
        let response = ApiResponse::from(ApiError::invalid_action("Explode"));
        assert!(!response.is_success());
        assert_eq!(response.body["code"], "InvalidAction");
    }
}
