//! Error types for CGP Rip
//!
//! Book-level failures (authentication, metadata) abort a rip. Page-level
//! failures (background fetch, overlay transport) are handled by the assembler
//! and only ever skip a single page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, RipError>;

/// Rip error type
#[derive(Error, Debug)]
pub enum RipError {
    /// Bad or expired session token, or the vendor withheld the signed cookies
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The pager metadata could not be fetched or parsed
    #[error("Metadata fetch failed: {0}")]
    MetadataFetch(String),

    /// Neither the JPEG nor the PNG background could be fetched
    #[error("Background fetch failed for page {page}: {reason}")]
    BackgroundFetch { page: u32, reason: String },

    /// Transport-level failure (connection, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Rejected before any network activity
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No pages could be assembled for book {0}")]
    NoPages(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// PDF assembly or serialization failure
    #[error("Document error: {0}")]
    Document(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RipError {
    /// HTTP status used when the error crosses the relay API
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::MetadataFetch(_) | Self::BackgroundFetch { .. } | Self::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_error",
            Self::MetadataFetch(_) => "metadata_fetch_error",
            Self::BackgroundFetch { .. } => "background_fetch_error",
            Self::Transport(_) => "transport_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::NoPages(_) => "no_pages",
            Self::Timeout(_) => "timeout",
            Self::Document(_) => "document_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for RipError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Relay request failed: {}", self);
        } else {
            tracing::debug!("Relay request rejected: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
