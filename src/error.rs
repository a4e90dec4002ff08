//! Error types for the proxy.
//!
//! Every variant renders to the OpenAI error envelope
//! `{"error": {"message", "type", "code"}}` through [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::translate::openai_types::ErrorResponse;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Malformed upstream payload: {message}")]
    Schema { message: String },

    #[error("Backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("{message}")]
    NotImplemented { code: &'static str, message: String },

    #[error("Missing credential: environment variable '{credential}' is not set")]
    MissingCredential { credential: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: msg.into(),
        }
    }

    pub fn not_implemented(code: &'static str, msg: impl Into<String>) -> Self {
        Self::NotImplemented {
            code,
            message: msg.into(),
        }
    }

    pub fn missing_credential(credential: impl Into<String>) -> Self {
        Self::MissingCredential {
            credential: credential.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `type` field of the error envelope.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::Schema { .. } | Self::BackendUnavailable { .. } => "opencode_error",
            Self::NotImplemented { .. } => "not_implemented",
            Self::MissingCredential { .. } | Self::Config { .. } => "configuration_error",
            _ => "proxy_error",
        }
    }

    /// The `code` field of the error envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request",
            Self::Schema { .. } => "schema_error",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::NotImplemented { code, .. } => *code,
            Self::MissingCredential { .. } => "missing_credential",
            Self::Config { .. } => "config_error",
            _ => "internal_error",
        }
    }

    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.to_string(), self.error_type(), self.code())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
